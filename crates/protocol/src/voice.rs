use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Payloads carried in a [`crate::Frame`] whose `event` starts with `voice.`,
/// sent by the client. Queued per-session by the gateway so only one is
/// processed at a time per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum VoiceClientMessage {
    #[serde(rename = "voice.join")]
    Join { channel_id: Uuid },

    #[serde(rename = "voice.leave")]
    Leave,

    #[serde(rename = "voice.connect_transport")]
    ConnectTransport { transport_id: String, dtls_parameters: Value },

    #[serde(rename = "voice.produce")]
    Produce { transport_id: String, kind: String, rtp_parameters: Value, source: Option<String> },

    #[serde(rename = "voice.produce_stop")]
    ProduceStop { producer_id: String },

    #[serde(rename = "voice.producer_pause")]
    ProducerPause { producer_id: String },

    #[serde(rename = "voice.producer_resume")]
    ProducerResume { producer_id: String },

    #[serde(rename = "voice.consumer_resume")]
    ConsumerResume { consumer_id: String },

    #[serde(rename = "voice.mute")]
    Mute { self_mute: Option<bool>, self_deaf: Option<bool> },

    #[serde(rename = "voice.set_quality")]
    SetQuality { consumer_id: String, spatial_layer: Option<u8>, temporal_layer: Option<u8> },
}

/// Server → client voice events, serialized as a [`crate::Frame`]'s `data`
/// with `event` set to the matching string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum VoiceServerMessage {
    #[serde(rename = "voice.router_capabilities")]
    RouterCapabilities { rtp_capabilities: Value },

    #[serde(rename = "voice.transport_created")]
    TransportCreated { send: Value, recv: Value },

    #[serde(rename = "voice.new_consumer")]
    NewConsumer {
        consumer_id: String,
        producer_id: String,
        user_id: Uuid,
        kind: String,
        rtp_parameters: Value,
        source: Option<String>,
    },

    #[serde(rename = "voice.produced")]
    Produced { producer_id: String },

    #[serde(rename = "voice.producer_closed")]
    ProducerClosed { producer_id: String },

    #[serde(rename = "voice.state_update")]
    StateUpdate { user_id: Uuid, channel_id: Option<Uuid>, self_mute: bool, self_deaf: bool },
}
