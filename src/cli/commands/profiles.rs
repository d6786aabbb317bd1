//! `crossdeck profiles` - list profiles under the profiles root.

use std::path::Path;

use crate::config::list_profiles;
use crate::error::Result;

/// Execute the profiles command.
pub fn execute(root: &Path, json: bool) -> Result<()> {
    let names = list_profiles(root)?;

    if json {
        let output = serde_json::json!({
            "root": root.display().to_string(),
            "profiles": names,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if names.is_empty() {
        println!("No profiles under: {}", root.display());
        println!("Create one: crossdeck init <name>");
    } else {
        println!("Profiles under: {}", root.display());
        for name in names {
            println!("  {name}");
        }
    }

    Ok(())
}
