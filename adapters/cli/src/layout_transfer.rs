use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use stowage_core::{CellCoord, CellRectSize, HostGrid, ItemId, TemplateId};
use stowage_world::{query, Container, ContainerError, ItemSpec};

const SNAPSHOT_DOMAIN: &str = "stowage";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "stowage:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Snapshot of a container's dimensions and contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LayoutSnapshot {
    /// Number of columns in the grid.
    pub(crate) columns: u32,
    /// Number of rows in the grid.
    pub(crate) rows: u32,
    /// Items stored in the container, in insertion order.
    pub(crate) items: Vec<LayoutItem>,
}

impl LayoutSnapshot {
    /// Captures the contents of `container`.
    pub(crate) fn capture(container: &Container) -> Self {
        let items = query::snapshots(container)
            .into_iter()
            .map(|snapshot| LayoutItem {
                id: snapshot.item.id,
                origin: snapshot.item.origin,
                size: snapshot.item.size,
                spawn_tag: snapshot.item.spawn_tag,
                quantity: snapshot.quantity,
            })
            .collect();
        Self {
            columns: container.width(),
            rows: container.height(),
            items,
        }
    }

    /// Rebuilds a container holding the captured items.
    pub(crate) fn restore(&self) -> Result<Container, ContainerError> {
        let mut container = Container::new(self.columns, self.rows);
        for item in &self.items {
            let mut spec = ItemSpec::new(item.id.as_str(), item.origin, item.size)
                .with_quantity(item.quantity);
            if let Some(tag) = &item.spawn_tag {
                spec = spec.tagged(tag.as_str());
            }
            let _ = container.insert(spec)?;
        }
        Ok(container)
    }

    /// Encodes the snapshot into a single-line transfer string.
    pub(crate) fn encode(&self) -> Result<String, LayoutTransferError> {
        let payload = SerializableLayout {
            items: self.items.clone(),
        };
        let json = serde_json::to_vec(&payload).map_err(LayoutTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.columns, self.rows
        ))
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, LayoutTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LayoutTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(LayoutTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(LayoutTransferError::MissingVersion)?;
        let dimensions = parts
            .next()
            .ok_or(LayoutTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(LayoutTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(LayoutTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(LayoutTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(LayoutTransferError::InvalidEncoding)?;
        let decoded: SerializableLayout =
            serde_json::from_slice(&bytes).map_err(LayoutTransferError::InvalidPayload)?;

        Ok(Self {
            columns,
            rows,
            items: decoded.items,
        })
    }
}

/// Item captured within a layout snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LayoutItem {
    /// Identity of the item.
    pub(crate) id: ItemId,
    /// Upper-left cell anchoring the footprint.
    pub(crate) origin: CellCoord,
    /// Footprint of the item.
    pub(crate) size: CellRectSize,
    /// Template that spawned the item, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) spawn_tag: Option<TemplateId>,
    /// Stack quantity.
    pub(crate) quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct SerializableLayout {
    items: Vec<LayoutItem>,
}

/// Errors that can occur while encoding or decoding layout transfer strings.
#[derive(Debug)]
pub(crate) enum LayoutTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    MissingVersion,
    /// The encoded snapshot did not include grid dimensions.
    MissingDimensions,
    /// The encoded snapshot did not include the payload segment.
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the encoded snapshot.
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for LayoutTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "layout file was empty"),
            Self::MissingPrefix => write!(f, "layout string is missing the prefix"),
            Self::MissingVersion => write!(f, "layout string is missing the version"),
            Self::MissingDimensions => write!(f, "layout string is missing the grid dimensions"),
            Self::MissingPayload => write!(f, "layout string is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "layout prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "layout version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse grid dimensions '{dimensions}'")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode layout payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not process layout payload: {error}")
            }
        }
    }
}

impl Error for LayoutTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), LayoutTransferError> {
    let invalid = || LayoutTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty_layout() {
        let snapshot = LayoutSnapshot {
            columns: 12,
            rows: 8,
            items: Vec::new(),
        };

        let encoded = snapshot.encode().expect("snapshot encodes");
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:12x8:")));

        let decoded = LayoutSnapshot::decode(&encoded).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn capture_and_restore_preserve_items() {
        let mut container = Container::new(6, 4);
        let _ = container
            .insert(
                ItemSpec::new("rifle#1", CellCoord::new(0, 0), CellRectSize::new(4, 1))
                    .tagged("rifle"),
            )
            .expect("rifle fits");
        let _ = container
            .insert(
                ItemSpec::new("ammo", CellCoord::new(5, 3), CellRectSize::new(1, 1))
                    .with_quantity(12),
            )
            .expect("ammo fits");

        let snapshot = LayoutSnapshot::capture(&container);
        let encoded = snapshot.encode().expect("snapshot encodes");
        let decoded = LayoutSnapshot::decode(&encoded).expect("snapshot decodes");
        assert_eq!(decoded, snapshot);

        let restored = decoded.restore().expect("layout restores");
        assert_eq!(query::snapshots(&restored), query::snapshots(&container));
    }

    #[test]
    fn rejects_foreign_prefix_and_bad_dimensions() {
        assert!(matches!(
            LayoutSnapshot::decode("maze:v1:4x4:e30"),
            Err(LayoutTransferError::InvalidPrefix(_))
        ));
        assert!(matches!(
            LayoutSnapshot::decode("stowage:v2:4x4:e30"),
            Err(LayoutTransferError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            LayoutSnapshot::decode("stowage:v1:0x4:e30"),
            Err(LayoutTransferError::InvalidDimensions(_))
        ));
        assert!(matches!(
            LayoutSnapshot::decode("   "),
            Err(LayoutTransferError::EmptyPayload)
        ));
    }

    #[test]
    fn overlapping_items_fail_to_restore() {
        let item = LayoutItem {
            id: ItemId::new("a"),
            origin: CellCoord::new(0, 0),
            size: CellRectSize::new(2, 2),
            spawn_tag: None,
            quantity: 1,
        };
        let snapshot = LayoutSnapshot {
            columns: 4,
            rows: 4,
            items: vec![
                item.clone(),
                LayoutItem {
                    id: ItemId::new("b"),
                    origin: CellCoord::new(1, 1),
                    ..item
                },
            ],
        };
        assert!(matches!(
            snapshot.restore(),
            Err(ContainerError::Occupied { .. })
        ));
    }
}
