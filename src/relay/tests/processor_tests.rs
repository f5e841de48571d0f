//! Unit tests for the relay processor.

use crate::relay::{
    adapters::memory::{ChannelFailure, InMemoryChannel},
    domain::{ERROR_MESSAGE_PROPERTY, InboundMessage, MessageMetadata, TIMESTAMP_PROPERTY},
    ports::PublishError,
    schema::Schema,
    services::{ErrorPolicy, InvocationOutcome, MessageHandler, ProcessingError, XmlRelayProcessor},
    validation::SchemaValidator,
};
use eyre::{Result, bail, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

const RECORD_XSD: &str = include_str!("../../../schemas/record.xsd");
const TARGET: &str = "http://example.com/new-namespace";
const VALID: &str = r#"<record xmlns="http://example.com/record"><id>1</id></record>"#;
const PUBLISHED: &str = r#"<record xmlns="http://example.com/new-namespace"><id>1</id></record>"#;

type TestProcessor = XmlRelayProcessor<SchemaValidator, InMemoryChannel, InMemoryChannel, DefaultClock>;

struct Harness {
    validator: Arc<SchemaValidator>,
    output: InMemoryChannel,
    errors: InMemoryChannel,
}

impl Harness {
    fn fail_open(&self) -> TestProcessor {
        XmlRelayProcessor::new(
            Arc::clone(&self.validator),
            Arc::new(self.output.clone()),
            ErrorPolicy::RouteToErrorChannel(Arc::new(self.errors.clone())),
            TARGET,
            Arc::new(DefaultClock),
        )
    }

    fn fail_closed(&self) -> TestProcessor {
        XmlRelayProcessor::new(
            Arc::clone(&self.validator),
            Arc::new(self.output.clone()),
            ErrorPolicy::Propagate,
            TARGET,
            Arc::new(DefaultClock),
        )
    }
}

#[fixture]
fn harness() -> Harness {
    let schema = Schema::parse(RECORD_XSD).expect("record schema should load");
    Harness {
        validator: Arc::new(SchemaValidator::new(Arc::new(schema))),
        output: InMemoryChannel::new("output"),
        errors: InMemoryChannel::new("errors"),
    }
}

fn message(body: &str) -> InboundMessage {
    InboundMessage::new(body, MessageMetadata::new("message-1"))
}

fn bodies(channel: &InMemoryChannel) -> Vec<String> {
    channel
        .sent()
        .iter()
        .map(|message| message.body().to_owned())
        .collect()
}

#[rstest]
#[tokio::test]
async fn valid_message_is_published_in_target_namespace(harness: Harness) -> Result<()> {
    let processor = harness.fail_open();

    let outcome = processor.handle(&message(VALID)).await?;

    ensure!(outcome == InvocationOutcome::Published);
    ensure!(bodies(&harness.output) == vec![PUBLISHED.to_owned()]);
    ensure!(harness.errors.attempts() == 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn handler_trait_delegates_to_processor(harness: Harness) -> Result<()> {
    let handler: Arc<dyn MessageHandler> = Arc::new(harness.fail_closed());

    let outcome = handler.handle(&message(VALID)).await?;

    ensure!(outcome == InvocationOutcome::Published);
    ensure!(harness.output.sent().len() == 1);
    Ok(())
}

#[rstest]
#[case::malformed("<record xmlns=\"http://example.com/record\"><id>1</record>", "malformed XML: ")]
#[case::schema_violation(
    "<record xmlns=\"http://example.com/record\"><id>one</id></record>",
    "XML validation error: "
)]
#[tokio::test]
async fn fail_open_routes_invalid_payload_verbatim(
    harness: Harness,
    #[case] payload: &str,
    #[case] message_prefix: &str,
) -> Result<()> {
    let processor = harness.fail_open();

    let outcome = processor.handle(&message(payload)).await?;

    ensure!(outcome == InvocationOutcome::ErrorRouted { record_delivered: true });
    ensure!(harness.output.attempts() == 0, "nothing reaches the output channel");
    let records = harness.errors.sent();
    ensure!(records.len() == 1);
    let record = records.first().ok_or_else(|| eyre::eyre!("error record expected"))?;
    ensure!(record.body() == payload);
    let error_message = record
        .property(ERROR_MESSAGE_PROPERTY)
        .ok_or_else(|| eyre::eyre!("error message expected"))?;
    ensure!(
        error_message.starts_with(message_prefix),
        "unexpected error message {error_message}"
    );
    ensure!(record.property(TIMESTAMP_PROPERTY).is_some());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn fail_closed_reraises_validation_errors(harness: Harness) -> Result<()> {
    let processor = harness.fail_closed();
    let payload = "<record xmlns=\"http://example.com/record\"/>";

    let result = processor.handle(&message(payload)).await;

    match result {
        Err(ProcessingError::Validation(err)) => {
            ensure!(!err.is_malformed());
            ensure!(err.to_string().contains("content is incomplete"));
        }
        other => bail!("expected validation error, got {other:?}"),
    }
    ensure!(harness.output.attempts() == 0);
    ensure!(harness.errors.attempts() == 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn output_failure_is_routed_when_fail_open(harness: Harness) -> Result<()> {
    harness.output.set_failure(Some(ChannelFailure::Unreachable));
    let processor = harness.fail_open();

    let outcome = processor.handle(&message(VALID)).await?;

    ensure!(outcome == InvocationOutcome::ErrorRouted { record_delivered: true });
    let records = harness.errors.sent();
    let record = records.first().ok_or_else(|| eyre::eyre!("error record expected"))?;
    ensure!(record.body() == VALID, "the untransformed payload is recorded");
    let error_message = record.property(ERROR_MESSAGE_PROPERTY).unwrap_or_default();
    ensure!(error_message.contains("output"), "unexpected error message {error_message}");
    Ok(())
}

#[rstest]
#[tokio::test]
async fn output_failure_is_reraised_when_fail_closed(harness: Harness) -> Result<()> {
    harness.output.set_failure(Some(ChannelFailure::Rejecting));
    let processor = harness.fail_closed();

    let result = processor.handle(&message(VALID)).await;

    ensure!(matches!(
        result,
        Err(ProcessingError::Publish(PublishError::Rejected { .. }))
    ));
    ensure!(harness.errors.attempts() == 0);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn lost_error_record_still_completes_the_invocation(harness: Harness) -> Result<()> {
    harness.errors.set_failure(Some(ChannelFailure::Unreachable));
    let processor = harness.fail_open();

    let outcome = processor.handle(&message("not xml")).await?;

    ensure!(outcome == InvocationOutcome::ErrorRouted { record_delivered: false });
    ensure!(harness.errors.attempts() == 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn invocations_share_nothing_but_configuration(harness: Harness) -> Result<()> {
    let processor = Arc::new(harness.fail_open());
    let payloads = [VALID, "<broken", VALID];

    let mut tasks = tokio::task::JoinSet::new();
    for (index, payload) in payloads.into_iter().enumerate() {
        let processor = Arc::clone(&processor);
        let inbound = InboundMessage::new(payload, MessageMetadata::new(format!("message-{index}")));
        tasks.spawn(async move { processor.handle(&inbound).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    ensure!(bodies(&harness.output) == vec![PUBLISHED.to_owned(), PUBLISHED.to_owned()]);
    ensure!(bodies(&harness.errors) == vec!["<broken".to_owned()]);
    ensure!(processor.target_namespace() == TARGET);
    Ok(())
}
