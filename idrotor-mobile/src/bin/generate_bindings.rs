//! Writes the host-facing interfaces of the rotator.
//!
//! - `swift` / `kotlin` / `python`: UniFFI bindings for `DeviceIdRotator`,
//!   read from the compiled library
//! - `c`: `idrotor.h` for the `rotateDeviceID` / `getCurrentDeviceID` ABI
//!
//! Swift output also gets `idrotor.h`, since iOS hosts usually load the
//! same dylib from Objective-C as well.
//!
//! Run with:
//! `cargo run -p idrotor-mobile --features bindgen-cli --bin generate-bindings -- -l swift`

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use uniffi_bindgen::bindings::{
    KotlinBindingGenerator, PythonBindingGenerator, SwiftBindingGenerator,
};
use uniffi_bindgen::library_mode::generate_bindings;
use uniffi_bindgen::EmptyCrateConfigSupplier;

const HEADER_NAME: &str = "idrotor.h";

#[derive(Parser)]
#[command(name = "generate-bindings")]
#[command(about = "Generate Swift/Kotlin/Python bindings and the C header for idrotor-mobile")]
struct Cli {
    /// Compiled library (.dylib, .so or .a); not needed for `-l c`
    #[arg(long, default_value = "../target/release/libidrotor_mobile.dylib")]
    library: Utf8PathBuf,

    /// Output language
    #[arg(short = 'l', long = "language", default_value = "swift")]
    language: Target,

    /// Output directory (defaults to `<language>/generated`)
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<Utf8PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Target {
    Swift,
    Kotlin,
    Python,
    C,
}

impl Target {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Python => "python",
            Self::C => "include",
        }
    }

    fn wants_header(self) -> bool {
        matches!(self, Self::Swift | Self::C)
    }
}

fn write_header(out_dir: &Utf8Path) -> anyhow::Result<()> {
    let path = out_dir.join(HEADER_NAME);
    std::fs::write(&path, idrotor_mobile::c_api::C_HEADER)?;
    println!("Wrote {path}");
    Ok(())
}

fn write_uniffi(target: Target, library: &Utf8Path, out_dir: &Utf8Path) -> anyhow::Result<()> {
    if !library.exists() {
        anyhow::bail!("library not found: {library} (build with `cargo build --release` first)");
    }
    let components = match target {
        Target::Swift => generate_bindings(
            library,
            None,
            &SwiftBindingGenerator,
            &EmptyCrateConfigSupplier,
            None,
            out_dir,
            false,
        )?
        .len(),
        Target::Kotlin => generate_bindings(
            library,
            None,
            &KotlinBindingGenerator,
            &EmptyCrateConfigSupplier,
            None,
            out_dir,
            false,
        )?
        .len(),
        Target::Python => generate_bindings(
            library,
            None,
            &PythonBindingGenerator,
            &EmptyCrateConfigSupplier,
            None,
            out_dir,
            false,
        )?
        .len(),
        Target::C => 0,
    };
    println!("Generated {components} UniFFI component(s) from {library}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let out_dir = cli
        .out_dir
        .unwrap_or_else(|| Utf8PathBuf::from(cli.language.dir_name()).join("generated"));
    std::fs::create_dir_all(&out_dir)?;

    if !matches!(cli.language, Target::C) {
        write_uniffi(cli.language, &cli.library, &out_dir)?;
    }
    if cli.language.wants_header() {
        write_header(&out_dir)?;
    }
    Ok(())
}
