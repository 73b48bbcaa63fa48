use rustc_version::{version_meta, Channel};

// NOTE: Activates the 'nightly' feature from Cargo.toml so the `Combi` extension trait gets
//       `rustc_on_unimplemented` messages. A failure to query the compiler leaves it off.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    if let Ok(meta) = version_meta() {
        if meta.channel == Channel::Nightly {
            println!("cargo:rustc-cfg=feature=\"nightly\"");
        }
    }
}
