fn main() {
    // ESP-IDF link arguments only matter for the firmware build; host
    // builds (Linux SBC, tests) have nothing to emit.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
