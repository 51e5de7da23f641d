#![cfg(feature = "http")]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use bpresolve::{
    CrossPredictionResolver, EndpointConfig, FeatureVector, HttpPredictor, PredictionRequest,
    Predictor, PredictorError, ResolveError, ResolveMode, Sex, Target,
};

/// A request as seen by the test server.
#[derive(Debug)]
struct Captured {
    method: String,
    path: String,
    body: Value,
}

fn read_request(stream: &mut TcpStream) -> Captured {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap();
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    Captured {
        method,
        path,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    }
}

/// Serves every connection with `handler` until the test process exits.
fn serve<H>(handler: H) -> (EndpointConfig, Receiver<Captured>)
where
    H: Fn(&Captured) -> (u16, String) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let captured = read_request(&mut stream);
            let (status, body) = handler(&captured);
            // Captured requests are visible before their reply is sent.
            if tx.send(captured).is_err() {
                break;
            }
            let response = format!(
                "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    let config = EndpointConfig {
        base_url: format!("http://{addr}/api/v1"),
        timeout_secs: 5,
        ..EndpointConfig::default()
    };
    (config, rx)
}

fn prediction_body(value: f64, model_type: &str) -> String {
    json!({
        "predicted_normalized": 0.0,
        "prediction_std_normalized": 0.5,
        "predicted_value_mmHg": value,
        "prediction_std_mmHg": 10.0,
        "confidence_interval_lower": value - 19.6,
        "confidence_interval_upper": value + 19.6,
        "input_type": "raw",
        "model_type": model_type,
    })
    .to_string()
}

fn features() -> FeatureVector {
    FeatureVector::builder()
        .is_raw(true)
        .sex(Sex::Female)
        .age(45.0)
        .height(152.0)
        .weight(63.0)
        .heart_rate(97.0)
        .build()
        .unwrap()
}

#[test]
fn iterative_run_over_http() {
    let (config, rx) = serve(|req| {
        if req.path.ends_with("/systolic") {
            let d = req.body["Diastolic_BP"].as_f64().unwrap();
            (200, prediction_body(d + 40.0, "knn_systolic"))
        } else {
            let s = req.body["Systolic_BP"].as_f64().unwrap();
            (200, prediction_body(s - 45.0, "knn_diastolic"))
        }
    });

    let resolver = CrossPredictionResolver::new(
        HttpPredictor::systolic(&config).unwrap(),
        HttpPredictor::diastolic(&config).unwrap(),
    );
    let res = resolver.resolve(&features(), ResolveMode::Iterative).unwrap();
    assert_eq!(res.systolic.predicted_value, 110.0);
    assert_eq!(res.diastolic.predicted_value, 65.0);
    assert_eq!(res.systolic.model_type.as_deref(), Some("knn_systolic"));

    let seen: Vec<Captured> = rx.try_iter().collect();
    assert_eq!(seen.len(), 6);
    let paths: Vec<&str> = seen.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/api/v1/knn/predict/systolic",
            "/api/v1/knn/predict/diastolic",
            "/api/v1/knn/predict/systolic",
            "/api/v1/knn/predict/diastolic",
            "/api/v1/knn/predict/systolic",
            "/api/v1/knn/predict/diastolic",
        ]
    );
    assert!(seen.iter().all(|c| c.method == "POST"));

    let first = &seen[0].body;
    assert_eq!(first["Diastolic_BP"], json!(80.0));
    assert_eq!(first["is_raw"], json!(true));
    assert_eq!(first["Sex"], json!(0));
    assert_eq!(first["BMI"], json!(27.27));
    assert_eq!(first["Diabetes_None"], json!(1));
    assert!(first.get("Systolic_BP").is_none());
}

#[test]
fn server_error_is_reported_with_status() {
    let (config, _rx) = serve(|_| (500, r#"{"detail":"Prediction error: boom"}"#.to_string()));

    let predictor = HttpPredictor::systolic(&config).unwrap();
    let fv = features();
    let err = predictor
        .predict(&PredictionRequest::systolic(&fv, 80.0))
        .unwrap_err();
    let PredictorError::Status { status, message } = &err else {
        panic!("expected status error, got {err}");
    };
    assert_eq!(*status, 500);
    assert!(message.contains("boom"));

    let resolver = CrossPredictionResolver::new(predictor, HttpPredictor::diastolic(&config).unwrap());
    let err = resolver.resolve_iterative(&fv).unwrap_err();
    let ResolveError::PredictorUnavailable {
        endpoint,
        round,
        status,
        ..
    } = &err
    else {
        panic!("expected unavailable, got {err}");
    };
    assert_eq!(*endpoint, Target::Systolic);
    assert_eq!(*round, Some(1));
    assert_eq!(*status, Some(500));
    assert!(err.is_retryable());
}

#[test]
fn missing_field_is_malformed() {
    let (config, _rx) = serve(|_| {
        (
            200,
            r#"{"predicted_value_mmHg": 120.0, "confidence_interval_lower": 100.0, "confidence_interval_upper": 140.0}"#
                .to_string(),
        )
    });

    let predictor = HttpPredictor::diastolic(&config).unwrap();
    let fv = features();
    let err = predictor
        .predict(&PredictionRequest::diastolic(&fv, 120.0))
        .unwrap_err();
    assert!(matches!(err, PredictorError::MalformedResponse { ref message } if message.contains("prediction_std_mmHg")));
}

#[test]
fn inverted_band_is_rejected_once_by_the_resolver() {
    let inverted = json!({
        "predicted_value_mmHg": 118.0,
        "prediction_std_mmHg": 9.0,
        "confidence_interval_lower": 140.0,
        "confidence_interval_upper": 100.0,
    })
    .to_string();
    let (config, rx) = serve(move |_| (200, inverted.clone()));

    let fv = features();
    let decoded = HttpPredictor::systolic(&config)
        .unwrap()
        .predict(&PredictionRequest::systolic(&fv, 80.0))
        .unwrap();
    assert_eq!(decoded.confidence_interval_lower, 140.0);

    let resolver = CrossPredictionResolver::new(
        HttpPredictor::systolic(&config).unwrap(),
        HttpPredictor::diastolic(&config).unwrap(),
    );
    let err = resolver.resolve_iterative(&fv).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(err.endpoint(), Some(Target::Systolic));
    assert_eq!(err.round(), Some(1));
    assert_eq!(rx.try_iter().count(), 2);
}

#[test]
fn non_json_body_is_malformed() {
    let (config, _rx) = serve(|_| (200, "<html>ok</html>".to_string()));

    let predictor = HttpPredictor::systolic(&config).unwrap();
    let fv = features();
    let err = predictor
        .predict(&PredictionRequest::systolic(&fv, 80.0))
        .unwrap_err();
    assert!(matches!(err, PredictorError::MalformedResponse { .. }));
}

#[test]
fn one_shot_over_http_hits_both_endpoints_once() {
    let (config, rx) = serve(|req| {
        if req.path.ends_with("/systolic") {
            (200, prediction_body(135.6, "knn_systolic"))
        } else {
            (422, r#"{"detail":"Systolic_BP missing"}"#.to_string())
        }
    });

    let resolver = CrossPredictionResolver::new(
        HttpPredictor::systolic(&config).unwrap(),
        HttpPredictor::diastolic(&config).unwrap(),
    );
    let err = resolver
        .resolve(
            &features(),
            ResolveMode::OneShot {
                systolic: 161.0,
                diastolic: 89.0,
            },
        )
        .unwrap_err();
    assert_eq!(err.endpoint(), Some(Target::Diastolic));
    assert_eq!(err.round(), None);
    assert!(!err.is_retryable());

    let mut seen: Vec<Captured> = rx.recv_timeout(Duration::from_secs(5)).into_iter().collect();
    seen.extend(rx.recv_timeout(Duration::from_secs(5)));
    assert_eq!(seen.len(), 2);
    for c in &seen {
        if c.path.ends_with("/systolic") {
            assert_eq!(c.body["Diastolic_BP"], json!(89.0));
        } else {
            assert_eq!(c.body["Systolic_BP"], json!(161.0));
        }
    }
}

#[test]
fn connection_refused_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = EndpointConfig {
        base_url: format!("http://127.0.0.1:{port}/api/v1"),
        timeout_secs: 2,
        ..EndpointConfig::default()
    };

    let predictor = HttpPredictor::systolic(&config).unwrap();
    let fv = features();
    let err = predictor
        .predict(&PredictionRequest::systolic(&fv, 80.0))
        .unwrap_err();
    assert!(matches!(err, PredictorError::Transport { .. }));
}

#[test]
fn mismatched_request_is_refused_locally() {
    let predictor = HttpPredictor::systolic(&EndpointConfig::default()).unwrap();
    let fv = features();
    let err = predictor
        .predict(&PredictionRequest::diastolic(&fv, 120.0))
        .unwrap_err();
    assert!(matches!(err, PredictorError::Encode { .. }));
}
