use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::Parser;
use futures::future;
use scoped_dataload::{
    BatchFunction, BatchResult, ChainedHook, Discriminated, ExecutionHook, ExecutionResult,
    FieldError, GraphQLError, LoaderOptions, PathSegment, QueryParameters, RequestContext,
    SourceError, TracingHook, VariantError, VariantResolver, Wiring,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const CHARACTERS: &str = "characters";
const R2_D2: &str = "2001";

#[derive(Debug, Parser)]
#[command(name = "starwars")]
#[command(about = "Resolves a Star Wars query with one batched fetch per level", long_about = None)]
struct Args {
    /// Query text. A `human` root field reads its id from `$id`; anything else asks for the hero.
    /// The depth of the result is the number of nested `friends` selections.
    #[arg(long, default_value = "{ hero { name friends { name friends { name } } } }")]
    query: String,

    /// JSON-encoded variables, e.g. '{"id": "1000"}'
    #[arg(long)]
    variables: Option<String>,

    #[arg(long)]
    operation_name: Option<String>,

    /// Fail a batch whose data source has not answered within this many milliseconds
    #[arg(long, env = "STARWARS_DISPATCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct Character {
    id: String,
    name: String,
    kind: &'static str,
    friends: Vec<String>,
}

impl Discriminated for Character {
    fn discriminant(&self) -> &str {
        self.kind
    }
}

#[derive(Debug, Clone, Copy)]
enum CharacterType {
    Human,
    Droid,
}

impl CharacterType {
    fn type_name(self) -> &'static str {
        match self {
            CharacterType::Human => "Human",
            CharacterType::Droid => "Droid",
        }
    }
}

fn character_types() -> Result<VariantResolver<CharacterType>, VariantError> {
    VariantResolver::new([("human", CharacterType::Human), ("droid", CharacterType::Droid)])
}

struct StarWarsData {
    characters: HashMap<String, Character>,
}

impl StarWarsData {
    fn new() -> Self {
        let cast: [(&str, &str, &'static str, &[&str]); 7] = [
            ("1000", "Luke Skywalker", "human", &["1002", "1003", "2000", "2001"]),
            ("1001", "Darth Vader", "human", &["1004"]),
            ("1002", "Han Solo", "human", &["1000", "1003", "2001"]),
            ("1003", "Leia Organa", "human", &["1000", "1002", "2000", "2001"]),
            ("1004", "Wilhuff Tarkin", "human", &["1001"]),
            ("2000", "C-3PO", "droid", &["1000", "1002", "1003", "2001"]),
            ("2001", "R2-D2", "droid", &["1000", "1002", "1003"]),
        ];
        let characters = cast
            .iter()
            .map(|(id, name, kind, friends)| {
                let character = Character {
                    id: (*id).to_owned(),
                    name: (*name).to_owned(),
                    kind: *kind,
                    friends: friends.iter().map(|f| (*f).to_owned()).collect(),
                };
                (character.id.clone(), character)
            })
            .collect();
        Self { characters }
    }
}

// Stands in for a batch HTTP API: one call answers every key of a dispatch.
#[derive(Clone)]
struct CharacterSource;

#[async_trait]
impl BatchFunction<String, Character> for CharacterSource {
    type Context = Arc<StarWarsData>;

    async fn load(keys: &[String], data: &Arc<StarWarsData>) -> BatchResult<Character> {
        tracing::info!(?keys, "fetching characters");
        Ok(keys
            .iter()
            .map(|id| {
                data.characters
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SourceError::new(format!("no character with id {}", id)))
            })
            .collect())
    }
}

struct Node {
    path: Vec<PathSegment>,
    outcome: Result<(Character, CharacterType), FieldError>,
    /// Indices of this character's friends in the next level.
    friends: Range<usize>,
}

/// Resolves `field` to the character `id` and its friends `depth` levels down, breadth first:
/// every load of a level is issued before the hook flushes the level.
async fn execute(
    ctx: &RequestContext,
    hook: &dyn ExecutionHook,
    types: &VariantResolver<CharacterType>,
    field: &str,
    id: String,
    depth: usize,
) -> ExecutionResult {
    let loader = match ctx.loader::<String, Character>(CHARACTERS) {
        Ok(loader) => loader,
        Err(e) => {
            return ExecutionResult::new(json!({ field: null }))
                .with_errors([FieldError::from(e).at([field])])
        }
    };

    let mut levels: Vec<Vec<Node>> = Vec::new();
    let mut frontier = vec![(vec![PathSegment::from(field)], loader.load(id))];
    for level in 0..=depth {
        hook.on_level_complete(level).await;
        let (paths, handles): (Vec<_>, Vec<_>) = frontier.drain(..).unzip();
        let outcomes = future::join_all(handles).await;

        let mut nodes = Vec::with_capacity(paths.len());
        for (path, outcome) in paths.into_iter().zip(outcomes) {
            let outcome = outcome.map_err(FieldError::from).and_then(|character| {
                types.resolve(&character).map(|t| (character, *t)).map_err(FieldError::from)
            });
            let start = frontier.len();
            match &outcome {
                Ok((character, _)) if level < depth => {
                    let friends = loader.load_many(character.friends.clone());
                    for (i, handle) in friends.into_iter().enumerate() {
                        let mut friend_path = path.clone();
                        friend_path.extend([PathSegment::from("friends"), PathSegment::Index(i)]);
                        frontier.push((friend_path, handle));
                    }
                }
                _ => {}
            }
            nodes.push(Node { path, outcome, friends: start..frontier.len() });
        }
        levels.push(nodes);
    }
    hook.on_execution_complete().await;

    let mut errors = Vec::new();
    let root = render(&levels, 0, 0, &mut errors);
    ExecutionResult::new(json!({ field: root })).with_errors(errors)
}

fn render(
    levels: &[Vec<Node>],
    level: usize,
    index: usize,
    errors: &mut Vec<GraphQLError>,
) -> Value {
    let node = &levels[level][index];
    match &node.outcome {
        Err(e) => {
            errors.push(e.clone().at(node.path.clone()));
            Value::Null
        }
        Ok((character, concrete)) => {
            let mut object = json!({
                "__typename": concrete.type_name(),
                "id": character.id,
                "name": character.name,
            });
            if level + 1 < levels.len() {
                object["friends"] =
                    node.friends.clone().map(|i| render(levels, level + 1, i, errors)).collect();
            }
            object
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut pairs = vec![("query", args.query)];
    pairs.extend(args.variables.map(|variables| ("variables", variables)));
    pairs.extend(args.operation_name.map(|name| ("operationName", name)));
    let params = QueryParameters::from_get(pairs)
        .map_err(|e| anyhow!("HTTP {}: {}", e.status_code(), e))?;

    let mut options = LoaderOptions::default();
    if let Some(ms) = args.timeout_ms {
        options = options.with_dispatch_timeout(Duration::from_millis(ms));
    }
    let wiring = Wiring::init_global(Wiring::new(options).loader(
        CHARACTERS,
        CharacterSource,
        Arc::new(StarWarsData::new()),
    ))?;

    let (field, id) = if params.query.contains("human") {
        match params.variables.get("id").and_then(Value::as_str) {
            Some(id) => ("human", id.to_owned()),
            None => bail!("`human` needs a string `id` variable"),
        }
    } else {
        ("hero", R2_D2.to_owned())
    };
    let depth = params.query.matches("friends").count();

    let ctx = wiring.new_request();
    let (timing, trigger) = (TracingHook::new(), ctx.dispatch_trigger());
    let hooks = ChainedHook::new().with(&timing).with(&trigger);
    let result = execute(&ctx, &hooks, &character_types()?, field, id, depth).await;
    let result = result.with_statistics(ctx.registry().statistics().await).with_tracing(&timing);
    tracing::info!(
        request_id = %ctx.request_id(),
        levels = trigger.levels(),
        keys = trigger.keys_dispatched(),
        "request complete"
    );

    println!("{}", serde_json::to_string_pretty(&result.to_specification())?);
    Ok(())
}
