use crate::builder::{SegmentBuilder, SegmentCommand};
use crate::error::Result;
use crate::session::{send_json, DeviceSession};

/// Largest segment command sent as a single request
///
/// ESP8266 builds have been seen to crash on requests around this size.
pub const MAX_PAYLOAD_BYTES: usize = 500;

/// Decide how a builder's segments go over the wire
///
/// A single request when forced or when the compact encoding fits in
/// [`MAX_PAYLOAD_BYTES`], otherwise one self-contained request per segment.
pub fn plan_segment_requests(
    builder: &SegmentBuilder<'_>,
    force_one_request: bool,
) -> Result<Vec<SegmentCommand>> {
    let combined = builder.build();
    if force_one_request {
        return Ok(vec![combined]);
    }

    let size = combined.encoded_len()?;
    if size <= MAX_PAYLOAD_BYTES {
        return Ok(vec![combined]);
    }

    tracing::debug!(
        "Segment command is {} bytes, splitting into {} requests",
        size,
        builder.len()
    );
    Ok(builder.build_split())
}

/// Send a builder's segments, split if too large for the device
pub async fn set_segments(
    session: &dyn DeviceSession,
    builder: &SegmentBuilder<'_>,
    force_one_request: bool,
) -> Result<()> {
    let requests = plan_segment_requests(builder, force_one_request)?;
    for request in &requests {
        send_json(session, request).await?;
    }
    Ok(())
}

/// Replace all segments with one selected segment spanning every LED
///
/// All other segment ids up to the device limit are sent as empty ranges,
/// which removes them. Always sent as one request.
pub async fn reset_segments(session: &dyn DeviceSession, set_defaults: bool) -> Result<()> {
    let info = session.info_or_err()?;
    let led_count = i64::from(info.led_info.count);
    let max_segments = i64::from(info.led_info.max_segments);

    let command = {
        let mut builder = SegmentBuilder::new(session);
        builder.add_segment(0, led_count, None, Some(0))?.selected(true)?;
        if set_defaults {
            builder.set_defaults(false)?;
        }
        for id in 1..max_segments {
            builder.add_segment(0, 0, None, Some(id))?;
        }
        builder.build()
    };

    send_json(session, &command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{info, FakeSession};
    use serde_json::json;

    fn session() -> FakeSession {
        FakeSession::default().with_info(info(300, 16, 100, 50))
    }

    /// Adds named segments until the combined encoding is exactly `target` bytes
    fn builder_of_size<'a>(session: &'a FakeSession, target: usize) -> SegmentBuilder<'a> {
        let mut builder = SegmentBuilder::new(session);
        for i in 0..4 {
            builder.add_segment(i * 10, i * 10 + 10, Some("x"), None).unwrap();
        }
        let base = builder.build().encoded_len().unwrap();
        assert!(base < target);

        // Pad the last segment's name so the total hits the target exactly
        let pad = "x".repeat(1 + target - base);
        let mut padded = SegmentBuilder::new(session);
        for i in 0..3 {
            padded.add_segment(i * 10, i * 10 + 10, Some("x"), None).unwrap();
        }
        padded.add_segment(30, 40, Some(pad.as_str()), None).unwrap();
        assert_eq!(padded.build().encoded_len().unwrap(), target);
        padded
    }

    #[test]
    fn small_command_is_sent_whole() {
        let session = session();
        let builder = builder_of_size(&session, MAX_PAYLOAD_BYTES);
        let plan = plan_segment_requests(&builder, false).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].segments().len(), 4);
    }

    #[test]
    fn oversized_command_is_split_per_segment() {
        let session = session();
        let builder = builder_of_size(&session, MAX_PAYLOAD_BYTES + 1);

        let plan = plan_segment_requests(&builder, false).unwrap();
        assert_eq!(plan, builder.build_split());
        assert!(plan.iter().all(|cmd| cmd.segments().len() == 1));

        let forced = plan_segment_requests(&builder, true).unwrap();
        assert_eq!(forced, vec![builder.build()]);
    }

    #[tokio::test]
    async fn set_segments_sends_requests_in_order() {
        let session = session();
        let builder = builder_of_size(&session, 600);
        set_segments(&session, &builder, false).await.unwrap();

        let ids: Vec<_> = session.sent().iter().map(|cmd| cmd["seg"][0]["id"].clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn reset_segments_clears_every_other_id() {
        let session = FakeSession::default().with_info(info(300, 4, 100, 50));
        reset_segments(&session, false).await.unwrap();

        assert_eq!(
            session.sent(),
            vec![json!({ "seg": [
                { "id": 0, "start": 0, "stop": 300, "sel": true },
                { "id": 1, "start": 0, "stop": 0 },
                { "id": 2, "start": 0, "stop": 0 },
                { "id": 3, "start": 0, "stop": 0 }
            ] })]
        );
    }
}
