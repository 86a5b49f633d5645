/// Builds the gRPC client and server code for `route_guide.proto` using
/// `tonic-prost-build`.
///
/// Generated modules land in the crate's `OUT_DIR` together with an encoded
/// file descriptor set, which the server registers with gRPC reflection.
///
/// # Point as a map key
///
/// `Point` is used as the key of the route note registry. prost derives `Eq`
/// and `Hash` for it on its own since both fields are plain integers, so the
/// key compares the raw fixed-point values with no tolerance.
///
/// # Files and Paths
///
/// - Proto file: `proto/route_guide.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// Panics if code generation fails.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("routeguide_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/route_guide.proto"], &["proto"])
        .unwrap();
}
