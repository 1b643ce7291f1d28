use dirfuzz_config::FuzzConfig;

pub fn run(config: &FuzzConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Print as YAML for readability
    let yaml = config.to_yaml()?;
    println!("{}", yaml);

    Ok(())
}
