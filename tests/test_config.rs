use std::io::Write;
use std::time::Duration;

use clap::Parser;
use fronius_bridge::coordinator::report::ReportFormat;
use fronius_bridge::prelude::*;

fn yaml_file(content: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

fn options(args: &[&str]) -> Options {
    Options::try_parse_from(std::iter::once("fronius-bridge").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn defaults() -> Result<()> {
    let config = Config::from_options(&options(&[]))?;

    assert_eq!(config.baud(), 19200);
    assert_eq!(config.servers(), 1);
    assert_eq!(config.format(), ReportFormat::KeyValue);
    assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    assert_eq!(config.wait_time(), Duration::from_secs(2));
    assert_eq!(config.port(), 10010);
    assert_eq!(config.log_file(), Some("/tmp/fronius0.log".to_string()));

    Ok(())
}

#[test]
fn command_line_flags() -> Result<()> {
    let config = Config::from_options(&options(&[
        "-1", "-dd", "-n", "3", "-O", "-t", "30", "-w", "5", "-l", "/dev/ttyUSB1", "4",
    ]))?;

    assert_eq!(config.baud(), 4800);
    assert_eq!(config.debug, 2);
    assert_eq!(config.servers(), 3);
    assert_eq!(config.format(), ReportFormat::Legacy);
    assert_eq!(config.idle_timeout(), Duration::from_secs(30));
    assert_eq!(config.wait_time(), Duration::from_secs(5));
    assert_eq!(config.device(), "/dev/ttyUSB1");
    assert_eq!(config.controller(), 4);
    assert_eq!(config.log_file(), None);

    Ok(())
}

#[test]
fn legacy_and_key_value_conflict() {
    assert!(Options::try_parse_from(["fronius-bridge", "-O", "-N"]).is_err());
}

#[test]
fn yaml_file_with_overrides() -> Result<()> {
    let file = yaml_file(
        "device: /dev/ttyS0\n\
         controller: 7\n\
         servers: 2\n\
         format: legacy\n\
         host: monitor.local\n\
         port: 1234\n\
         log_file: /var/log/fronius{}.log\n",
    )?;
    let path = file.path().to_string_lossy().to_string();

    let config = Config::new(path.clone())?;
    assert_eq!(config.device(), "/dev/ttyS0");
    assert_eq!(config.servers(), 2);
    assert_eq!(config.format(), ReportFormat::Legacy);
    assert_eq!(config.host(), "monitor.local");
    assert_eq!(config.port(), 1234);
    assert_eq!(config.log_file(), Some("/var/log/fronius7.log".to_string()));

    // the command line wins
    let config = Config::from_options(&options(&["-c", &path, "-n", "5", "-N"]))?;
    assert_eq!(config.servers(), 5);
    assert_eq!(config.format(), ReportFormat::KeyValue);
    assert_eq!(config.host(), "monitor.local");

    Ok(())
}

#[test]
fn too_many_servers_is_rejected() -> Result<()> {
    let file = yaml_file("servers: 13\n")?;
    let path = file.path().to_string_lossy().to_string();
    assert!(Config::new(path).is_err());

    assert!(Config::from_options(&options(&["-n", "0"])).is_err());

    Ok(())
}

#[test]
fn fake_mode_needs_no_device() -> Result<()> {
    let file = yaml_file("device: ''\nfake: true\n")?;
    let config = Config::new(file.path().to_string_lossy().to_string())?;
    assert!(config.fake);

    let file = yaml_file("device: ''\n")?;
    assert!(Config::new(file.path().to_string_lossy().to_string()).is_err());

    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    assert!(Config::new("/nonexistent/fronius.yaml".to_string()).is_err());
}
