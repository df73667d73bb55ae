//! PCI identifiers used to locate the GPU.

/// Intel vendor ID (PCI-SIG assigned).
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Base class code for display controllers (`class >> 16`).
pub const DISPLAY_CLASS: u32 = 0x03;

/// Returns `true` if a 24-bit PCI class code is a display controller.
#[must_use]
pub const fn is_display_class(class: u32) -> bool {
    (class >> 16) & 0xFF == DISPLAY_CLASS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vga_and_3d_controllers_are_display() {
        assert!(is_display_class(0x03_00_00));
        assert!(is_display_class(0x03_80_00));
        assert!(!is_display_class(0x06_04_00));
        assert!(!is_display_class(0x01_08_02));
    }
}
