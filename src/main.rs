//! mcptrust CLI binary.
//!
//! All logic is in the library; main.rs only invokes cli::run() and maps
//! its result to a process exit code.

fn main() {
    let code = match mcptrust::cli::run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:?}");
            1
        }
    };
    std::process::exit(code);
}
