fn main() {
    let udl_path = std::path::Path::new(&std::env::var("CARGO_MANIFEST_DIR").unwrap())
        .join("src/tether_core.udl");
    println!("cargo:rerun-if-changed={}", udl_path.display());
    let udl_path = udl_path.to_str().expect("UDL path contains invalid UTF-8");
    uniffi_build::generate_scaffolding_for_crate(udl_path, "tether_core")
        .expect("failed to generate UniFFI scaffolding");
}
