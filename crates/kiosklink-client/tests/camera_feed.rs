//! Camera feed fed by the backend frame fanout.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use bytes::Bytes;

use kiosklink_client::services::CameraFeed;
use kiosklink_core::protocol::envelope::Header;
use kiosklink_core::protocol::frame::{encode_camera_frame, FramePixels};
use kiosklink_core::protocol::Backend;

use common::{harness, settle, wait_until};

fn frame(fill: u8) -> Bytes {
    let pixels = FramePixels::Raw {
        width: 4,
        height: 2,
        channels: 4,
        pixels: Bytes::from(vec![fill; 32]),
    };
    encode_camera_frame(&Header::outbound("CAMERA_FRAME"), &pixels).unwrap()
}

#[tokio::test]
async fn keeps_latest_frame_and_counts() {
    let h = harness::<Backend>();
    let feed = CameraFeed::attach(&h.channel);
    let mut rx = feed.subscribe();
    let server = h.open().await;

    assert!(feed.latest().is_none());
    server.send_binary(frame(1));
    server.send_binary(frame(2));

    wait_until(|| feed.frames_received() == 2).await;
    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow_and_update().clone().unwrap();
    match &latest.pixels {
        FramePixels::Raw { width, height, pixels, .. } => {
            assert_eq!((*width, *height), (4, 2));
            assert!(pixels.iter().all(|b| *b == 2));
        }
        other => panic!("unexpected pixels {other:?}"),
    }
}

#[tokio::test]
async fn detach_stops_updates_but_keeps_last_frame() {
    let h = harness::<Backend>();
    let feed = CameraFeed::attach(&h.channel);
    let server = h.open().await;

    server.send_binary(frame(7));
    wait_until(|| feed.frames_received() == 1).await;

    feed.detach();
    server.send_binary(frame(8));
    settle().await;

    assert_eq!(feed.frames_received(), 1);
    assert_eq!(feed.latest().unwrap().pixels.bytes()[0], 7);
}
