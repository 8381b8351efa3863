//! Writes 10,000 short messages into a file that rotates every 10 KiB and
//! compresses its archives.

use logrotate::RotatingFile;
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("logrotate-demo");
    let log = RotatingFile::builder()
        .file(dir.join("rotate_size_10k.log"))
        .rotate_size("10k")
        .compress(true)
        .open()?;

    let mut out = &log;
    for i in 0..10_000 {
        writeln!(out, "This is test message {i}.")?;
    }
    log.close()?;
    log.wait_for_retention();

    let mut archives = 0;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        println!("{:>8}  {}", entry.metadata()?.len(), entry.file_name().to_string_lossy());
        archives += 1;
    }
    println!("{archives} files in {}", dir.display());
    Ok(())
}
