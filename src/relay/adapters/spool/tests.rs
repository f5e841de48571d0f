//! Unit tests for the spool transport.

use super::{SpoolError, SpoolRoot};
use crate::relay::domain::{ERROR_MESSAGE_PROPERTY, OutboundMessage};
use crate::relay::ports::{InboundSource, OutboundChannel, SourceError};
use camino::Utf8PathBuf;
use eyre::{Result, ensure};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Spool {
    root: SpoolRoot,
    _dir: TempDir,
}

#[fixture]
fn spool() -> Spool {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("spool"))
        .expect("temp path should be UTF-8");
    let root = SpoolRoot::open(&path).expect("spool should open");
    Spool { root, _dir: dir }
}

#[rstest]
#[tokio::test]
async fn sent_messages_are_read_back_in_send_order(spool: Spool) -> Result<()> {
    let channel = spool.root.channel("out")?;
    channel.send(OutboundMessage::new("<first/>")).await?;
    channel
        .send(OutboundMessage::new("<second/>").with_property(ERROR_MESSAGE_PROPERTY, "boom"))
        .await?;

    let messages = spool.root.read_channel("out")?;

    let bodies: Vec<&str> = messages.iter().map(|(_, message)| message.body()).collect();
    ensure!(bodies == vec!["<first/>", "<second/>"]);
    let second = messages
        .get(1)
        .map(|(_, message)| message)
        .ok_or_else(|| eyre::eyre!("second message expected"))?;
    ensure!(second.property(ERROR_MESSAGE_PROPERTY) == Some("boom"));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn receive_complete_cycle_removes_files(spool: Spool) -> Result<()> {
    let channel = spool.root.channel("in")?;
    channel.send(OutboundMessage::new("<a/>")).await?;
    channel.send(OutboundMessage::new("<b/>")).await?;
    let source = spool.root.source("in")?;

    let batch = source.receive_batch(10).await?;
    ensure!(batch.len() == 2);
    ensure!(source.receive_batch(10).await?.is_empty(), "outstanding messages are not handed out twice");

    for message in &batch {
        source.complete(message).await?;
    }

    ensure!(spool.root.read_channel("in")?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn abandoned_messages_stay_for_the_next_poll(spool: Spool) -> Result<()> {
    let channel = spool.root.channel("in")?;
    channel.send(OutboundMessage::new("<a/>")).await?;
    let source = spool.root.source("in")?;

    let batch = source.receive_batch(1).await?;
    let message = batch.first().ok_or_else(|| eyre::eyre!("message expected"))?;
    ensure!(message.metadata().delivery_count() == 1);
    source.abandon(message).await?;

    let again = source.receive_batch(1).await?;
    let redelivered = again.first().ok_or_else(|| eyre::eyre!("message expected"))?;
    ensure!(redelivered.message_id() == message.message_id());
    ensure!(redelivered.metadata().delivery_count() == 2);
    ensure!(spool.root.read_channel("in")?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn settling_an_unknown_message_fails(spool: Spool) -> Result<()> {
    let channel = spool.root.channel("in")?;
    channel.send(OutboundMessage::new("<a/>")).await?;
    let source = spool.root.source("in")?;
    let batch = source.receive_batch(1).await?;
    let message = batch.first().ok_or_else(|| eyre::eyre!("message expected"))?;
    source.complete(message).await?;

    let result = source.complete(message).await;

    ensure!(matches!(result, Err(SourceError::UnknownMessage(_))));
    Ok(())
}

#[rstest]
#[case("")]
#[case("..")]
#[case("a/b")]
#[case(".hidden")]
fn channel_names_must_be_single_components(spool: Spool, #[case] name: &str) {
    let result = spool.root.channel(name);
    assert!(matches!(result, Err(SpoolError::InvalidChannelName(_))));
}

#[rstest]
fn staging_files_are_not_listed(spool: Spool) -> Result<()> {
    let channel_path = spool.root.path().join("in");
    spool.root.source("in")?;
    std::fs::write(channel_path.join(".partial.xml.tmp"), "<a/>")?;
    std::fs::write(channel_path.join("notes.txt"), "ignored")?;

    ensure!(spool.root.read_channel("in")?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn undecodable_body_is_set_aside(spool: Spool) -> Result<()> {
    let channel = spool.root.channel("in")?;
    channel.send(OutboundMessage::new("<good/>")).await?;
    let channel_path = spool.root.path().join("in");
    std::fs::write(channel_path.join("00000000-bad.xml"), [0xff_u8, 0xfe, 0x00])?;
    let source = spool.root.source("in")?;

    let batch = source.receive_batch(16).await?;

    let bodies: Vec<&str> = batch.iter().map(|message| message.body()).collect();
    ensure!(bodies == vec!["<good/>"], "got {bodies:?}");
    ensure!(channel_path.join(".00000000-bad.xml.rejected").exists());
    let listed = spool.root.read_channel("in")?;
    ensure!(listed.len() == 1);
    Ok(())
}
