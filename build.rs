fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=assets/index.html");

    // Package name, version and build time for `/api/info`
    built::write_built_file()
        .expect("Failed to acquire build-time information");
}
