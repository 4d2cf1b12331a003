pub fn run() -> anyhow::Result<()> {
    println!("mindtrail {}", env!("CARGO_PKG_VERSION"));
    println!("Persistent memory capture for AI coding assistants");
    Ok(())
}
