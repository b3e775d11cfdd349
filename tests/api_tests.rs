// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the method-name command surface

use iris_camera::api::{METHODS, MethodResult, dispatch};
use iris_camera::backends::virtual_camera::{
    BackendOp, VirtualAuthorization, VirtualBackend, VirtualProbe,
};
use iris_camera::{CameraError, CameraSession, Config};
use serde_json::{Value, json};
use std::sync::Arc;

fn spawn() -> (CameraSession, VirtualProbe) {
    let backend = VirtualBackend::with_default_units();
    let probe = backend.probe();
    let session = CameraSession::spawn(
        Box::new(backend),
        Arc::new(VirtualAuthorization::granted()),
        &Config::default(),
    )
    .unwrap();
    (session, probe)
}

async fn call(
    session: &CameraSession,
    method: &str,
    args: Value,
) -> Result<MethodResult, CameraError> {
    dispatch(session, method, &args).await
}

#[tokio::test]
async fn test_list_available_lenses_shape() {
    let (session, _probe) = spawn();

    let result = call(&session, "listAvailableLenses", Value::Null).await.unwrap();
    let lenses = result.as_value().unwrap().as_array().unwrap();
    assert_eq!(lenses.len(), 4);

    let first = &lenses[0];
    assert_eq!(first["id"], "0");
    assert_eq!(first["position"], "back");
    assert_eq!(first["category"], "wide");
    assert_eq!(first["supportsFocus"], true);
    assert!(first["fieldOfView"].as_f64().unwrap() > 40.0);

    let result = call(&session, "listAvailableLenses", json!({ "includeFront": false }))
        .await
        .unwrap();
    assert_eq!(result.as_value().unwrap().as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_switch_lens_by_category() {
    let (session, probe) = spawn();
    call(&session, "initialize", json!({})).await.unwrap();

    let result = call(&session, "switchLens", json!({ "category": "ultraWide" }))
        .await
        .unwrap();
    assert_eq!(result.as_value().unwrap()["id"], "2");
    assert_eq!(probe.attached_lens().as_deref(), Some("2"));

    let err = call(&session, "switchLens", json!({ "category": "fisheye" }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");
}

#[tokio::test]
async fn test_take_photo_returns_bytes() {
    let (session, probe) = spawn();
    call(&session, "initialize", Value::Null).await.unwrap();

    let result = call(&session, "takePhoto", json!({ "flashMode": "on" }))
        .await
        .unwrap();
    match result {
        MethodResult::Bytes(bytes) => assert_eq!(&bytes[..2], &[0xFF, 0xD8]),
        other => panic!("expected bytes, got {:?}", other),
    }
    assert!(probe.ops().iter().any(|op| matches!(op, BackendOp::CaptureStill(_))));
}

#[tokio::test]
async fn test_setters_return_null() {
    let (session, _probe) = spawn();
    call(&session, "initialize", Value::Null).await.unwrap();

    for (method, args) in [
        ("setZoom", json!({ "zoomFactor": 2.5 })),
        ("setTorch", json!({ "enabled": true })),
        ("setResolutionPreset", json!({ "preset": "veryHigh" })),
        ("setFrameRateRange", json!({ "minFps": 15, "maxFps": 30 })),
        ("setFocusMode", json!({ "mode": "locked" })),
        ("setExposurePoint", json!({})),
        ("setWhiteBalance", json!({ "temperature": 4000.0 })),
        ("setFocus", json!({ "x": 0.2, "y": 0.8 })),
    ] {
        let result = call(&session, method, args).await;
        assert_eq!(result, Ok(MethodResult::Null), "{method}");
    }

    let mode = call(&session, "getFocusMode", Value::Null).await.unwrap();
    assert_eq!(mode, MethodResult::Value(json!("locked")));
}

#[tokio::test]
async fn test_exposure_offset_methods() {
    let (session, _probe) = spawn();

    let step = call(&session, "getExposureOffsetStepSize", Value::Null)
        .await
        .unwrap();
    assert_eq!(step, MethodResult::Value(json!(0.1)));

    call(&session, "initialize", Value::Null).await.unwrap();
    let applied = call(&session, "setExposureOffset", json!({ "offset": -0.3 }))
        .await
        .unwrap();
    let applied = applied.as_value().unwrap().as_f64().unwrap();
    assert!((applied + 0.3).abs() < 1e-9, "{applied}");
}

#[tokio::test]
async fn test_recording_methods() {
    let (session, _probe) = spawn();
    call(&session, "initialize", Value::Null).await.unwrap();

    let err = call(&session, "stopVideoRecording", Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "no_active_recording");

    let started = call(
        &session,
        "startVideoRecording",
        json!({ "filePath": "/tmp/api_clip.mp4", "enableAudio": false }),
    )
    .await
    .unwrap();
    assert_eq!(started, MethodResult::Value(json!("/tmp/api_clip.mp4")));

    let stopped = call(&session, "stopVideoRecording", Value::Null).await.unwrap();
    assert_eq!(stopped, started);
}

#[tokio::test]
async fn test_malformed_arguments() {
    let (session, _probe) = spawn();

    let err = call(&session, "setZoom", json!({ "zoomFactor": "wide" }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");

    let err = call(&session, "setFocus", json!({ "x": 0.5 })).await.unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");

    let err = call(&session, "setResolutionPreset", json!({ "preset": "8k" }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_arguments");
}

#[tokio::test]
async fn test_unknown_method() {
    let (session, _probe) = spawn();
    let err = call(&session, "makeCoffee", Value::Null).await.unwrap_err();
    assert_eq!(err, CameraError::NotImplemented("makeCoffee".into()));
    assert!(!METHODS.contains(&"makeCoffee"));
}

#[tokio::test]
async fn test_lifecycle_methods() {
    let (session, probe) = spawn();

    call(&session, "initialize", Value::Null).await.unwrap();
    call(&session, "pauseSession", Value::Null).await.unwrap();
    assert!(!probe.is_running());
    call(&session, "resumeSession", Value::Null).await.unwrap();
    assert!(probe.is_running());

    let version = call(&session, "getPlatformVersion", Value::Null).await.unwrap();
    assert!(version.as_value().unwrap().as_str().unwrap().starts_with("Virtual"));

    call(&session, "disposeSession", Value::Null).await.unwrap();
    let err = call(&session, "getFocusMode", Value::Null).await.unwrap_err();
    assert_eq!(err.code(), "session_not_ready");
}
