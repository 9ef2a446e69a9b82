//! HTTP frame hub round-trips over loopback TCP.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camera_hub::{FrameHub, HttpFrameHub, ACK_REPLY};
use image::{ImageFormat, Rgb, RgbImage};

fn encoded_frame(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn bind() -> (HttpFrameHub, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let hub = HttpFrameHub::bind("127.0.0.1:0", shutdown.clone()).expect("bind hub");
    (hub, shutdown)
}

#[test]
fn frame_is_received_and_acknowledged() {
    let (mut hub, _shutdown) = bind();
    let url = format!("http://{}/frames/cam1", hub.local_addr());

    let device = std::thread::spawn(move || {
        let response = ureq::post(&url)
            .send_bytes(&encoded_frame(6, 4))
            .expect("post frame");
        response.into_string().expect("read reply")
    });

    let incoming = hub.recv_frame().unwrap().expect("frame");
    assert_eq!(incoming.device_id, "cam1");
    assert_eq!(incoming.frame.dimensions(), (6, 4));
    assert_eq!(*incoming.frame.get_pixel(0, 0), Rgb([10, 20, 30]));
    hub.send_reply(ACK_REPLY).unwrap();

    assert_eq!(device.join().unwrap(), "OK");
}

#[test]
fn bad_requests_are_rejected_without_surfacing() {
    let (mut hub, _shutdown) = bind();
    let addr = hub.local_addr();

    let device = std::thread::spawn(move || {
        let statuses: Vec<u16> = [
            ureq::post(&format!("http://{}/upload/cam1", addr)).send_bytes(&encoded_frame(2, 2)),
            ureq::post(&format!("http://{}/frames/bad%20id", addr))
                .send_bytes(&encoded_frame(2, 2)),
            ureq::post(&format!("http://{}/frames/cam1", addr)).send_bytes(b"not an image"),
        ]
        .into_iter()
        .map(|result| match result {
            Err(ureq::Error::Status(code, _)) => code,
            Ok(response) => response.status(),
            Err(err) => panic!("unexpected transport error: {}", err),
        })
        .collect();

        let ok = ureq::post(&format!("http://{}/frames/cam2", addr))
            .send_bytes(&encoded_frame(3, 3))
            .expect("post frame");
        (statuses, ok.status())
    });

    let incoming = hub.recv_frame().unwrap().expect("frame");
    assert_eq!(incoming.device_id, "cam2");
    hub.send_reply(ACK_REPLY).unwrap();

    let (statuses, ok) = device.join().unwrap();
    assert_eq!(statuses, vec![404, 400, 400]);
    assert_eq!(ok, 200);
}

#[test]
fn shutdown_flag_releases_idle_receiver() {
    let (mut hub, shutdown) = bind();

    let flag = shutdown.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        flag.store(true, Ordering::SeqCst);
    });

    assert!(hub.recv_frame().unwrap().is_none());
    stopper.join().unwrap();
}

#[test]
fn reply_without_pending_frame_is_an_error() {
    let (mut hub, _shutdown) = bind();
    assert!(hub.send_reply(ACK_REPLY).is_err());
}
