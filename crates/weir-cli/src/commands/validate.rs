//! `weir validate`: structural checks of application files.

use super::load_application;
use anyhow::Result;
use std::path::PathBuf;
use weir_core::application::validate;

pub fn run(files: &[PathBuf]) -> Result<()> {
    let mut invalid = 0;
    for file in files {
        let app = load_application(file)?;
        match validate(&app.spec) {
            Ok(()) => println!("OK     {} ({} assets)", file.display(), app.spec.data.len()),
            Err(errors) => {
                invalid += 1;
                println!("ERROR  {}", file.display());
                for error in errors {
                    println!("         - {error}");
                }
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} application file(s) are invalid", files.len());
    }
    Ok(())
}
