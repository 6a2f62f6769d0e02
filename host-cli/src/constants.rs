pub const SERIAL_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2_000;

/// Reads, silent or not, spent waiting for `X` while leaving provisioning mode after a failure.
pub const ABORT_EXIT_MAX_READS: usize = 16;

/// USB serial bridges commonly found on ESP32 boards, as (VID, PID).
pub const KNOWN_USB_BRIDGES: &[(u16, u16)] = &[
    (0x303A, 0x1001), // Espressif USB-Serial/JTAG
    (0x303A, 0x4001), // Espressif native CDC
    (0x10C4, 0xEA60), // Silicon Labs CP210x
    (0x1A86, 0x7523), // WCH CH340
    (0x1A86, 0x55D4), // WCH CH9102
    (0x0403, 0x6001), // FTDI FT232R
];
pub const DEVICE_IDENTITY_KEYWORDS: &[&str] = &["esp32", "espressif", "cp210", "ch340", "ch910"];
