use pledge::courier::{
    Courier, CourierError, Message, MessageId, MessageListener, MessageService, Receipt,
    TransportError,
};
use pledge::executor::{BuildError, ThreadPoolBuilder};
use pledge::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_send_message_resolves_with_receipt() {
    let courier = Courier::builder().build(|_: &Message| Ok(200)).unwrap();
    let message = Message::new("alice", "hello");
    let id = message.id();

    let receipt = courier.send_message(message).wait().unwrap();

    assert_eq!(receipt.message_id, id);
    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.attempts, 1);
    assert!(receipt.is_success());
}

#[test]
fn test_retryable_errors_are_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();

    let courier = Courier::builder()
        .max_attempts(3)
        .retry_backoff(Duration::from_millis(1))
        .build(move |_: &Message| {
            if c.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::retryable("busy"))
            } else {
                Ok(202)
            }
        })
        .unwrap();

    let receipt = courier.send_message(Message::new("bob", "hi")).wait().unwrap();

    assert_eq!(receipt.attempts, 3);
    assert_eq!(receipt.status, 202);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_retries_exhausted() {
    let courier = Courier::builder()
        .max_attempts(2)
        .retry_backoff(Duration::from_millis(1))
        .build(|_: &Message| Err(TransportError::retryable("still busy")))
        .unwrap();

    let error = courier.send_message(Message::new("bob", "hi")).wait().unwrap_err();

    let transport = error.downcast_ref::<TransportError>().unwrap();
    assert_eq!(transport.reason, "still busy");
}

#[test]
fn test_fatal_error_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();

    let courier = Courier::builder()
        .max_attempts(5)
        .build(move |_: &Message| {
            c.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::fatal("no such recipient"))
        })
        .unwrap();

    let error = courier.send_message(Message::new("nobody", "")).wait().unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(error.downcast_ref::<TransportError>().is_some_and(|e| !e.retryable));
}

#[test]
fn test_cancelled_message_is_never_delivered() {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let log = delivered.clone();

    let courier = Courier::builder()
        .build(move |message: &Message| {
            if message.recipient() == "slow" {
                let _ = gate_rx.recv();
            }
            log.lock().unwrap().push(message.id());
            Ok(200)
        })
        .unwrap();

    let first = courier.send_message(Message::new("slow", "1"));
    let second_message = Message::new("fast", "2");
    let second_id = second_message.id();
    let second = courier.send_message(second_message);

    assert!(second.cancel());
    gate_tx.send(()).unwrap();

    assert!(first.wait().is_ok());
    assert!(matches!(second.wait(), Err(Error::Cancelled)));

    drop(courier);
    assert!(!delivered.lock().unwrap().contains(&second_id));
}

#[test]
fn test_cancel_during_backoff() {
    let courier = Courier::builder()
        .max_attempts(10)
        .retry_backoff(Duration::from_secs(30))
        .build(|_: &Message| Err(TransportError::retryable("down")))
        .unwrap();

    let future = courier.send_message(Message::new("ops", "ping"));
    thread::sleep(Duration::from_millis(20));
    future.cancel();

    // Dropping joins the delivery thread; it must not sit out the backoff.
    drop(courier);
    assert!(matches!(future.wait(), Err(Error::Cancelled)));
}

#[test]
fn test_queue_full() {
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);

    let courier = Courier::builder()
        .queue_capacity(1)
        .build(move |_: &Message| {
            let _ = started_tx.try_send(());
            let _ = gate_rx.recv();
            Ok(200)
        })
        .unwrap();

    let first = courier.send_message(Message::new("a", ""));
    started_rx.recv().unwrap();

    let second = courier.send_message(Message::new("b", ""));
    let third = courier.send_message(Message::new("c", ""));

    let error = third.wait().unwrap_err();
    assert_eq!(error.downcast_ref::<CourierError>(), Some(&CourierError::QueueFull));

    gate_tx.send(()).unwrap();
    gate_tx.send(()).unwrap();
    assert!(first.wait().is_ok());
    assert!(second.wait().is_ok());
}

#[test]
fn test_drop_delivers_backlog() {
    let delivered = Arc::new(AtomicU32::new(0));
    let d = delivered.clone();

    let courier = Courier::builder()
        .build(move |_: &Message| {
            thread::sleep(Duration::from_millis(1));
            d.fetch_add(1, Ordering::SeqCst);
            Ok(200)
        })
        .unwrap();

    let futures: Vec<_> = (0..10)
        .map(|i| courier.send_message(Message::new("bulk", format!("{i}"))))
        .collect();
    drop(courier);

    assert_eq!(delivered.load(Ordering::SeqCst), 10);
    assert!(futures.into_iter().all(|f| f.wait().is_ok()));
}

#[test]
fn test_zero_capacity_is_rejected() {
    let result = Courier::builder()
        .queue_capacity(0)
        .build(|_: &Message| Ok(200));

    assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
}

#[test]
fn test_callbacks_run_on_configured_executor() {
    let pool = ThreadPoolBuilder::new()
        .worker_threads(1)
        .thread_name("courier-cb")
        .build()
        .unwrap();
    let courier = Courier::builder()
        .callback_executor(pool.executor())
        .build(|_: &Message| Ok(200))
        .unwrap();

    let name = courier
        .send_message(Message::new("x", "y"))
        .then(|_| thread::current().name().map(str::to_owned));

    assert_eq!(name.wait().unwrap().as_deref(), Some("courier-cb-0"));
}

#[test]
fn test_courier_as_message_service() {
    fn notify(service: &dyn MessageService) -> pledge::Result<u16> {
        service
            .send_message(Message::new("svc", "via trait"))
            .map(|receipt| receipt.status)
            .wait()
    }

    let courier = Courier::builder().build(|_: &Message| Ok(201)).unwrap();

    assert_eq!(notify(&courier).unwrap(), 201);
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
    done: Mutex<Option<crossbeam_channel::Sender<()>>>,
}

impl RecordingListener {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
        if let Some(done) = self.done.lock().unwrap().as_ref() {
            let _ = done.send(());
        }
    }
}

impl MessageListener for RecordingListener {
    fn on_message_sent(&self, receipt: &Receipt) {
        self.record(format!("sent:{}", receipt.status));
    }

    fn on_message_failed(&self, _id: MessageId, error: &Error) {
        self.record(format!("failed:{error}"));
    }

    fn on_message_cancelled(&self, _id: MessageId) {
        self.record("cancelled".to_string());
    }
}

#[test]
fn test_listener_style_callbacks() {
    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    let listener = Arc::new(RecordingListener {
        done: Mutex::new(Some(done_tx)),
        ..Default::default()
    });

    let courier = Courier::builder()
        .build(|message: &Message| match message.recipient() {
            "ok" => Ok(200),
            _ => Err(TransportError::fatal("rejected")),
        })
        .unwrap();

    courier.send_message_with_listener(Message::new("ok", ""), listener.clone());
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    courier.send_message_with_listener(Message::new("bad", ""), listener.clone());
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(
        *listener.events.lock().unwrap(),
        vec!["sent:200".to_string(), "failed:delivery failed: rejected".to_string()]
    );
}

#[test]
fn test_listener_cancelled_callback() {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    let listener = Arc::new(RecordingListener::default());

    let courier = Courier::builder()
        .build(move |message: &Message| {
            if message.recipient() == "slow" {
                let _ = gate_rx.recv();
            }
            Ok(200)
        })
        .unwrap();

    let _blocker = courier.send_message(Message::new("slow", ""));
    let handle = courier.send_message_with_listener(Message::new("queued", ""), listener.clone());

    assert!(handle.cancel());
    gate_tx.send(()).unwrap();
    drop(courier);

    assert_eq!(*listener.events.lock().unwrap(), vec!["cancelled".to_string()]);
}
