use serde::{Deserialize, Serialize};

use crate::models::{Channel, ChannelKind};

pub const CHANNELS_UNAVAILABLE_PLACEHOLDER: &str = "Could not load channels";

/// The guild's channel list as last fetched.
///
/// An unavailable list is kept distinct from an empty one: both disable the
/// pickers, but only the failure is reported as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ChannelList {
    Loaded { channels: Vec<Channel> },
    Unavailable { reason: String },
}

impl ChannelList {
    pub fn channels(&self) -> &[Channel] {
        match self {
            ChannelList::Loaded { channels } => channels,
            ChannelList::Unavailable { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ChannelList::Loaded { .. } => None,
            ChannelList::Unavailable { reason } => Some(reason),
        }
    }

    pub fn of_kind(&self, kind: ChannelKind) -> impl Iterator<Item = &Channel> {
        self.channels().iter().filter(move |c| c.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerOption {
    pub value: String,
    pub label: String,
}

/// A channel selector as an editor should render it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPicker {
    pub field: String,
    pub accepts: ChannelKind,
    pub options: Vec<PickerOption>,
    pub disabled: bool,
    pub placeholder: String,
}

impl ChannelPicker {
    pub fn build(field: &str, accepts: ChannelKind, list: &ChannelList) -> Self {
        let options: Vec<PickerOption> = list
            .of_kind(accepts)
            .map(|c| PickerOption {
                value: c.id.clone(),
                label: match accepts {
                    ChannelKind::Text => format!("# {}", c.name),
                    ChannelKind::Category => format!("📁 {}", c.name),
                },
            })
            .collect();

        // No channels at all means the list is unusable for every picker
        let disabled = list.channels().is_empty();
        let placeholder = if disabled {
            CHANNELS_UNAVAILABLE_PLACEHOLDER.to_string()
        } else {
            match accepts {
                ChannelKind::Text => "Select a channel".to_string(),
                ChannelKind::Category => "Select a category".to_string(),
            }
        };

        Self {
            field: field.to_string(),
            accepts,
            options,
            disabled,
            placeholder,
        }
    }
}
