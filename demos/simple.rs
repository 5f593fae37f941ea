use std::collections::HashMap;

use async_trait::async_trait;
use scoped_dataload::{BatchFunction, BatchResult, LoadError, Loader, SourceError};

// Empty functor that implements the BatchFunction trait. For this example, it
// trivially loads values from some HashMap.
struct MyBatchFn;

#[async_trait]
impl BatchFunction<i64, String> for MyBatchFn {
    type Context = HashMap<i64, String>;

    async fn load(keys: &[i64], context: &Self::Context) -> BatchResult<String> {
        Ok(keys
            .iter()
            .map(|k| {
                context.get(k).cloned().ok_or_else(|| SourceError::new(format!("no film {}", k)))
            })
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let mut context = HashMap::new();
    context.insert(2001, "a space odyssey".to_owned());
    context.insert(7, "samurai".to_owned());
    context.insert(12, "angry men".to_owned());

    let loader = Loader::new("films", MyBatchFn, context);

    let samurai = loader.load(7);
    let missing = loader.load(15);
    // Nothing has been fetched yet; both keys go out in a single batch.
    assert_eq!(loader.dispatch().await, 2);
    assert_eq!(samurai.await.as_deref(), Ok("samurai"));
    assert_eq!(missing.await, Err(LoadError::Key(SourceError::new("no film 15"))));

    let handles = loader.load_many(vec![12, 2010, 2001, 7]);
    // 7 is already cached, so only three keys are fetched.
    assert_eq!(loader.dispatch().await, 3);
    let mut values = Vec::new();
    for handle in handles {
        values.push(handle.await.ok());
    }
    assert_eq!(
        values.iter().map(Option::as_deref).collect::<Vec<_>>(),
        vec![Some("angry men"), None, Some("a space odyssey"), Some("samurai")]
    );
}
