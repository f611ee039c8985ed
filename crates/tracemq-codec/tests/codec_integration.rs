//! ---
//! tmq_section: "02-codec"
//! tmq_subsection: "module"
//! tmq_type: "source"
//! tmq_scope: "code"
//! tmq_description: "End-to-end codec and rehydration behaviour."
//! tmq_version: "v0.0.0-prealpha"
//! tmq_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;
use tracemq_codec::trace::attach_span_context;
use tracemq_codec::{
    trace_rehydration, CodecConfig, DeliveryMode, DurableQueueConfig, Envelope, Handler,
    HeaderValue, Marshaler, MarshalingError, Message, Metadata, OtelMarshaler,
    DEFAULT_MESSAGE_UUID_HEADER_KEY, SPAN_ID_HEADER, TRACE_ID_HEADER,
};

const TRACE: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const SPAN: &str = "00f067aa0ba902b7";

fn order_message() -> Message {
    let mut message = Message::with_new_uuid(r#"{"order":42}"#);
    message.metadata = [
        ("tenant", "acme"),
        ("content-kind", "order.created"),
        ("empty", ""),
    ]
    .into_iter()
    .collect::<Metadata>();
    message
}

fn with_span(mut message: Message) -> Message {
    let span_context = SpanContext::new(
        TraceId::from_hex(TRACE).expect("trace id"),
        SpanId::from_hex(SPAN).expect("span id"),
        TraceFlags::SAMPLED,
        false,
        TraceState::default(),
    );
    message.set_context(attach_span_context(&Context::new(), span_context));
    message
}

#[test]
fn roundtrip_preserves_identity_payload_and_metadata() {
    let marshaler = OtelMarshaler::new();
    let original = order_message();

    let envelope = marshaler.marshal(&original).expect("marshal");
    let decoded = marshaler.unmarshal(&envelope).expect("unmarshal");

    assert_eq!(decoded.uuid, original.uuid);
    assert_eq!(decoded.payload, original.payload);
    assert_eq!(decoded.metadata, original.metadata);
}

#[test]
fn roundtrip_propagates_trace_ids() {
    let marshaler = OtelMarshaler::new();
    let envelope = marshaler
        .marshal(&with_span(order_message()))
        .expect("marshal");
    let decoded = marshaler.unmarshal(&envelope).expect("unmarshal");

    let span_context = decoded.span_context();
    assert!(span_context.is_valid());
    assert_eq!(span_context.trace_id().to_string(), TRACE);
    assert_eq!(span_context.span_id().to_string(), SPAN);

    assert_eq!(decoded.metadata.get("tenant"), "acme");
    assert_eq!(decoded.metadata.get(TRACE_ID_HEADER), TRACE);
    assert_eq!(decoded.metadata.get(SPAN_ID_HEADER), SPAN);
}

#[test]
fn untraced_message_stays_untraced() {
    let marshaler = OtelMarshaler::new();
    let envelope = marshaler.marshal(&order_message()).expect("marshal");
    assert!(!envelope.headers.contains_key(TRACE_ID_HEADER));
    assert!(!envelope.headers.contains_key(SPAN_ID_HEADER));

    let decoded = marshaler.unmarshal(&envelope).expect("unmarshal");
    assert!(!decoded.span_context().is_valid());
}

#[test]
fn missing_identity_header_decodes_to_empty_uuid() {
    let mut envelope = Envelope {
        body: "payload".into(),
        ..Envelope::default()
    };
    envelope.headers.insert("tenant".into(), "acme".into());

    let decoded = OtelMarshaler::new().unmarshal(&envelope).expect("unmarshal");
    assert_eq!(decoded.uuid, "");
    assert_eq!(&decoded.payload[..], b"payload");
    assert_eq!(decoded.metadata.get("tenant"), "acme");
}

#[test]
fn non_string_metadata_is_rejected() {
    let mut envelope = OtelMarshaler::new()
        .marshal(&order_message())
        .expect("marshal");
    envelope
        .headers
        .insert("x-death".into(), HeaderValue::Array(vec![HeaderValue::Long(1)]));

    match OtelMarshaler::new().unmarshal(&envelope) {
        Err(MarshalingError::InvalidMetadata { key, found }) => {
            assert_eq!(key, "x-death");
            assert_eq!(found, "array");
        }
        other => panic!("expected metadata error, got {other:?}"),
    }
}

#[test]
fn delivery_mode_follows_config() {
    let message = order_message();

    let persistent = OtelMarshaler::from_config(&CodecConfig::default())
        .marshal(&message)
        .expect("marshal");
    assert_eq!(persistent.delivery_mode, DeliveryMode::Persistent);

    let transient = OtelMarshaler::from_config(&CodecConfig {
        transient_delivery: true,
        ..CodecConfig::default()
    })
    .marshal(&message)
    .expect("marshal");
    assert_eq!(transient.delivery_mode, DeliveryMode::Transient);
}

#[test]
fn postprocess_output_is_final() {
    let marshaler = OtelMarshaler::new().with_postprocess(|_envelope: Envelope| {
        let mut replaced = Envelope {
            body: "replaced".into(),
            delivery_mode: DeliveryMode::Transient,
            app_id: Some("billing".into()),
            ..Envelope::default()
        };
        replaced
            .headers
            .insert(DEFAULT_MESSAGE_UUID_HEADER_KEY.into(), "fixed-id".into());
        replaced
    });

    let envelope = marshaler.marshal(&order_message()).expect("marshal");
    assert_eq!(&envelope.body[..], b"replaced");
    assert_eq!(envelope.delivery_mode, DeliveryMode::Transient);
    assert_eq!(envelope.app_id.as_deref(), Some("billing"));
    assert_eq!(envelope.headers.len(), 1);
    assert_eq!(marshaler.unmarshal(&envelope).expect("unmarshal").uuid, "fixed-id");
}

#[test]
fn forwarded_metadata_rehydrates_in_handler() {
    // a relay copied metadata into a fresh message without envelope headers
    let mut forwarded = Message::new("fwd-1", "body");
    forwarded.metadata.set(TRACE_ID_HEADER, TRACE);
    forwarded.metadata.set(SPAN_ID_HEADER, SPAN);

    let handler = trace_rehydration(|message: Message| -> Result<Vec<Message>, String> {
        let span_context = message.span_context();
        assert_eq!(span_context.trace_id().to_string(), TRACE);
        assert_eq!(span_context.span_id().to_string(), SPAN);

        let mut reply = Message::with_new_uuid("ack");
        reply.set_context(message.context().clone());
        Ok(vec![reply])
    });

    let produced = handler.handle(forwarded).expect("handler succeeds");
    let envelope = OtelMarshaler::new().marshal(&produced[0]).expect("marshal");
    assert_eq!(envelope.header_str(TRACE_ID_HEADER), Some(TRACE));
}

#[test]
fn concurrent_encode_and_decode_share_one_marshaler() {
    let marshaler = Arc::new(
        OtelMarshaler::new().with_postprocess(|mut envelope: Envelope| {
            envelope.content_type = Some("application/json".into());
            envelope
        }),
    );

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let marshaler = Arc::clone(&marshaler);
            thread::spawn(move || {
                for i in 0..50 {
                    let mut message = Message::new(format!("{worker}-{i}"), format!("{i}"));
                    message.metadata.set("worker", worker.to_string());
                    let envelope = marshaler.marshal(&message).expect("marshal");
                    let decoded = marshaler.unmarshal(&envelope).expect("unmarshal");
                    assert_eq!(decoded.uuid, message.uuid);
                    assert_eq!(decoded.metadata, message.metadata);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker finished");
    }
}

#[test]
fn durable_queue_config_uses_default_codec() {
    let config = DurableQueueConfig::new("amqp://localhost:5672/");
    let envelope = config.marshaler.marshal(&order_message()).expect("marshal");
    assert_eq!(envelope.delivery_mode, DeliveryMode::Persistent);
    assert!(envelope.headers.contains_key(DEFAULT_MESSAGE_UUID_HEADER_KEY));
}

#[test]
fn codec_config_deserializes_from_toml() {
    let config: CodecConfig = toml::from_str(
        r#"
message_uuid_header_key = "x-message-id"
transient_delivery = true
"#,
    )
    .expect("parse codec config");
    assert_eq!(config.message_uuid_header_key, "x-message-id");
    assert!(config.transient_delivery);

    let defaults: CodecConfig = toml::from_str("").expect("parse empty config");
    assert_eq!(defaults, CodecConfig::default());
}
