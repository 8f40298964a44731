//! Line protocol spoken on stdin.
//!
//! ```text
//! IN:<plate>,<type>[,<base64 image>]   vehicle arrival
//! SYNC                                 drain the offline queue now
//! STATUS                               print sync status
//! DIAG | DIAG:REPAIR                   run diagnostics (optionally repair)
//! QUIT                                 stop the client
//! ```

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use parkgate_core::{EntryImage, VehicleType};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Entry {
        plate: String,
        vehicle_type: VehicleType,
        image: Option<EntryImage>,
    },
    Sync,
    Status,
    Diagnose { repair: bool },
    Quit,
}

impl Command {
    /// Parses a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if let Some(rest) = line.strip_prefix("IN:") {
            return parse_entry(rest).map(Some);
        }

        let command = match line.to_ascii_uppercase().as_str() {
            "SYNC" => Command::Sync,
            "STATUS" => Command::Status,
            "DIAG" => Command::Diagnose { repair: false },
            "DIAG:REPAIR" => Command::Diagnose { repair: true },
            "QUIT" | "EXIT" => Command::Quit,
            _ => bail!("unknown command: {}", line),
        };
        Ok(Some(command))
    }
}

fn parse_entry(rest: &str) -> Result<Command> {
    let mut parts = rest.splitn(3, ',');

    let plate = parts
        .next()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("entry is missing a plate"))?;

    let vehicle_type = parts
        .next()
        .ok_or_else(|| anyhow!("entry is missing a vehicle type"))?
        .parse::<VehicleType>()?;

    let image = match parts.next().map(str::trim) {
        Some(encoded) if !encoded.is_empty() => Some(EntryImage::new(
            STANDARD
                .decode(encoded)
                .context("entry image is not valid base64")?,
        )),
        _ => None,
    };

    Ok(Command::Entry {
        plate: plate.to_string(),
        vehicle_type,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        let cmd = Command::parse("IN:B 1234 XYZ,mobil").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::Entry {
                plate: "B 1234 XYZ".to_string(),
                vehicle_type: VehicleType::Mobil,
                image: None,
            }
        );
    }

    #[test]
    fn test_parse_entry_with_image() {
        let cmd = Command::parse("IN:B1,Motor,aGVsbG8=").unwrap().unwrap();
        match cmd {
            Command::Entry { image, .. } => {
                assert_eq!(image.unwrap().as_bytes(), b"hello");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(Command::parse("IN:,Motor").is_err());
        assert!(Command::parse("IN:B1").is_err());
        assert!(Command::parse("IN:B1,Bus").is_err());
        assert!(Command::parse("IN:B1,Motor,%%%").is_err());
    }

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(Command::parse("sync").unwrap(), Some(Command::Sync));
        assert_eq!(
            Command::parse("DIAG:REPAIR").unwrap(),
            Some(Command::Diagnose { repair: true })
        );
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert!(Command::parse("OPEN").is_err());
    }
}
