//! `crossdeck init` - create a new, empty profile.

use std::path::Path;

use crate::error::Result;
use crate::store::ProfileStore;

/// Execute the init command.
pub fn execute(root: &Path, name: &str, json: bool) -> Result<()> {
    let store = ProfileStore::create(root, name)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "profile": name,
            "path": crate::store::profile::profile_dir(root, name).display().to_string(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Created profile '{name}'");
        println!("  Collection: {}", crate::store::profile::collection_path(&crate::store::profile::profile_dir(root, name)).display());
        println!("  Media:      {}", store.media().path().display());
    }

    Ok(())
}
