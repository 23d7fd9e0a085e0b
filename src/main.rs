//! vendor-trace: identify the upstream versions of vendored Go dependencies

use anyhow::Result;

fn main() -> Result<()> {
    let code = vendor_trace::cli::run()?;
    std::process::exit(code);
}
