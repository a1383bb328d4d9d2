use anyhow::Result;
use chrono::TimeZone;
use std::env;
use std::fs;
use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<()> {
    // Generate git information
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Add build timestamp
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => chrono::Utc
            .timestamp_opt(val.parse::<i64>()?, 0)
            .single()
            .unwrap_or_else(chrono::Utc::now),
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    // Report the library version alongside the binary version
    let audiomux_version = read_audiomux_version().unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=AUDIOMUX_VERSION={audiomux_version}");

    println!("cargo:rerun-if-changed=audiomux/Cargo.toml");

    Ok(())
}

/// Parse audiomux/Cargo.toml for the library version.
fn read_audiomux_version() -> Result<String> {
    let toml_content = fs::read_to_string("audiomux/Cargo.toml")?;

    for line in toml_content.lines() {
        let line = line.trim();
        if line.starts_with("version") && line.contains('=') {
            if let Some(equals_pos) = line.find('=') {
                let version = line[equals_pos + 1..].trim().trim_matches('"');
                return Ok(version.to_string());
            }
        }
    }

    anyhow::bail!("Could not find version in audiomux/Cargo.toml");
}
