//! The suspending proxy's backpressure story needs real wall-clock time to
//! observe — pausing the clock would hide the very delay this test exists
//! to measure.

use async_trait::async_trait;
use oak_core::{OakError, Proxy, Subject, Transducer, UpdateResult};
use oak_runtime::run;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Echo;

impl Transducer for Echo {
    type State = ();
    type Event = i32;
    type Output = i32;
    type Env = ();

    fn update(&self, _state: &mut (), event: i32) -> UpdateResult<i32, (), i32> {
        UpdateResult::output(event)
    }

    fn is_terminal(&self, _state: &()) -> bool {
        false
    }
}

/// A subject that takes 5ms to accept each value, so a suspending proxy's
/// producer genuinely waits on it.
struct SlowSubject {
    values: Mutex<Vec<i32>>,
}

#[async_trait]
impl Subject<i32> for SlowSubject {
    async fn send(&self, value: i32) -> Result<(), OakError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.values.lock().unwrap().push(value);
        Ok(())
    }
}

#[tokio::test]
async fn suspending_proxy_backpressures_the_producer() {
    let proxy = Proxy::suspending();
    let input = proxy.input();
    let subject = Arc::new(SlowSubject {
        values: Mutex::new(Vec::new()),
    });

    let handle = tokio::spawn(run(Echo, (), proxy.clone(), (), subject.clone()));

    let start = Instant::now();
    for value in [1, 2, 3, 4] {
        input.send(value).await.unwrap();
    }
    let elapsed = start.elapsed();

    proxy.finish();
    handle.await.unwrap().unwrap();

    assert!(
        elapsed >= Duration::from_millis(20),
        "four 5ms-suspending sends should take at least 20ms, took {elapsed:?}"
    );
    assert_eq!(subject.values.lock().unwrap().clone(), vec![1, 2, 3, 4]);
}
