#[cfg(feature = "mcs-sdk")]
use std::{env, path::PathBuf};

/// Check for common MCS SDK installation roots (containing include/MCSControl.h)
#[cfg(feature = "mcs-sdk")]
fn find_mcs_sdk() -> Option<PathBuf> {
    let candidates = [
        "C:\\SmarAct\\MCS\\SDK",
        "/opt/smaract/mcs",
        "/usr/local",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join("include").join("MCSControl.h").exists())
}

/// Library directory inside an SDK root; 64-bit layout first.
#[cfg(feature = "mcs-sdk")]
fn sdk_lib_dir(sdk_dir: &std::path::Path) -> PathBuf {
    let lib64 = sdk_dir.join("lib64");
    if lib64.exists() {
        lib64
    } else {
        sdk_dir.join("lib")
    }
}

fn main() {
    // Bindgen and linking only run with `mcs-sdk`; without it the crate
    // still provides the status and result-code constants.
    #[cfg(feature = "mcs-sdk")]
    {
        println!("cargo:rerun-if-env-changed=MCS_SDK_DIR");
        println!("cargo:rerun-if-changed=wrapper.h");

        let sdk_dir = match env::var("MCS_SDK_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => match find_mcs_sdk() {
                Some(found) => {
                    println!(
                        "cargo:warning=MCS_SDK_DIR not set, auto-detected: {}",
                        found.display()
                    );
                    found
                }
                None => panic!(
                    "MCS_SDK_DIR must point to the MCS SDK root (include/MCSControl.h) \
                     when the `mcs-sdk` feature is enabled"
                ),
            },
        };

        let include_dir = sdk_dir.join("include");
        if !include_dir.join("MCSControl.h").exists() {
            panic!("MCSControl.h not found in {}", include_dir.display());
        }

        let bindings = bindgen::Builder::default()
            .header("wrapper.h")
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .clang_arg(format!("-I{}", include_dir.display()))
            // Synchronous API used by the transport
            .allowlist_function("SA_FindSystems")
            .allowlist_function("SA_OpenSystem")
            .allowlist_function("SA_CloseSystem")
            .allowlist_function("SA_GetNumberOfChannels")
            .allowlist_function("SA_GotoPositionRelative_S")
            .allowlist_function("SA_StepMove_S")
            .allowlist_function("SA_GetStatus_S")
            .allowlist_function("SA_Stop_S")
            // Declared in lib.rs so they exist without the SDK
            .blocklist_type("SA_STATUS")
            .blocklist_type("SA_INDEX")
            .generate()
            .expect("Unable to generate MCSControl bindings");

        let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
        bindings
            .write_to_file(out_path.join("bindings.rs"))
            .expect("Couldn't write bindings!");

        let lib_dir = sdk_lib_dir(&sdk_dir);
        if lib_dir.exists() {
            println!("cargo:rustc-link-search=native={}", lib_dir.display());
        } else {
            println!(
                "cargo:warning=MCS SDK lib path does not exist: {}; linker will search default paths",
                lib_dir.display()
            );
        }
        println!("cargo:rustc-link-lib=dylib=MCSControl");
    }
}
