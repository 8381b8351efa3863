//! Rotates daily and at 100 MiB, whichever comes first, with options read
//! from JSON the way a service would load them from its config file.

use logrotate::{Options, RotatingFile};
use std::io::Write;

const CONFIG: &str = r#"{
    "rotate_period": "daily",
    "rotate_size": "100m",
    "max_archives": 30,
    "compress": true,
    "compression": "zstd"
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options: Options = serde_json::from_str(CONFIG)?;
    let options = options.file(std::env::temp_dir().join("logrotate-demo").join("scheduled.log"));
    let log = RotatingFile::new(options)?;
    println!("{:#?}", log.config());

    writeln!(&log, "rotate by daily and file size 100m")?;
    log.rotate()?;
    writeln!(&log, "after a manual rotation")?;
    log.close()?;
    log.wait_for_retention();
    Ok(())
}
