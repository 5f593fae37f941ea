use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use scoped_dataload::{
    BatchFunction, BatchResult, Discriminated, ExecutionHook, ExecutionResult, FieldError,
    LoaderOptions, PathSegment, RequestContext, SourceError, VariantResolver, Wiring,
};
use serde_json::{json, Value};

use super::Recorder;

pub const CHARACTERS: &str = "characters";
pub const R2_D2: &str = "2001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub friends: Vec<String>,
}

impl Discriminated for Character {
    fn discriminant(&self) -> &str {
        &self.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterType {
    Human,
    Droid,
}

impl CharacterType {
    pub fn type_name(self) -> &'static str {
        match self {
            CharacterType::Human => "Human",
            CharacterType::Droid => "Droid",
        }
    }
}

pub fn character_types() -> VariantResolver<CharacterType> {
    VariantResolver::new([("human", CharacterType::Human), ("droid", CharacterType::Droid)])
        .unwrap()
}

pub struct StarWarsDb {
    characters: HashMap<String, Character>,
    pub recorder: Arc<Recorder>,
}

impl StarWarsDb {
    pub fn new() -> Arc<Self> {
        Self::with(std::iter::empty())
    }

    /// The canonical cast plus `extra` records.
    pub fn with(extra: impl IntoIterator<Item = Character>) -> Arc<Self> {
        let cast = [
            ("1000", "Luke Skywalker", "human", &["1002", "1003", "2000", "2001"][..]),
            ("1001", "Darth Vader", "human", &["1004"][..]),
            ("1002", "Han Solo", "human", &["1000", "1003", "2001"][..]),
            ("1003", "Leia Organa", "human", &["1000", "1002", "2000", "2001"][..]),
            ("1004", "Wilhuff Tarkin", "human", &["1001"][..]),
            ("2000", "C-3PO", "droid", &["1000", "1002", "1003", "2001"][..]),
            ("2001", "R2-D2", "droid", &["1000", "1002", "1003"][..]),
        ];
        let characters = cast
            .iter()
            .map(|(id, name, kind, friends)| character(id, name, kind, friends))
            .chain(extra)
            .map(|c| (c.id.clone(), c))
            .collect();
        Arc::new(Self { characters, recorder: Recorder::new() })
    }
}

pub fn character(id: &str, name: &str, kind: &str, friends: &[&str]) -> Character {
    Character {
        id: id.to_owned(),
        name: name.to_owned(),
        kind: kind.to_owned(),
        friends: friends.iter().map(|f| (*f).to_owned()).collect(),
    }
}

#[derive(Clone)]
pub struct CharacterSource;

#[async_trait]
impl BatchFunction<String, Character> for CharacterSource {
    type Context = Arc<StarWarsDb>;
    async fn load(keys: &[String], db: &Arc<StarWarsDb>) -> BatchResult<Character> {
        db.recorder.record(keys);
        Ok(keys
            .iter()
            .map(|id| {
                db.characters
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SourceError::new(format!("unknown character {}", id)))
            })
            .collect())
    }
}

pub fn wiring(db: Arc<StarWarsDb>) -> Wiring {
    Wiring::new(LoaderOptions::default()).loader(CHARACTERS, CharacterSource, db)
}

fn path(segments: &[PathSegment]) -> Vec<PathSegment> {
    segments.to_vec()
}

/// Resolves `{ hero { __typename name friends { name friends { name } } } }` breadth first, the
/// way the host engine does: every field of a level is started, then `hook` is told the level is
/// complete, then the values of the level are awaited.
pub async fn hero_query(
    ctx: &RequestContext,
    hook: &dyn ExecutionHook,
    types: &VariantResolver<CharacterType>,
) -> ExecutionResult {
    let hero_path = [PathSegment::from("hero")];
    let characters = match ctx.loader::<String, Character>(CHARACTERS) {
        Ok(loader) => loader,
        Err(e) => {
            return ExecutionResult::new(json!({ "hero": null }))
                .with_errors([FieldError::from(e).at(path(&hero_path))])
        }
    };
    let mut errors = Vec::new();

    let hero = characters.load(R2_D2.to_owned());
    hook.on_level_complete(0).await;
    let hero = match hero.await.map_err(FieldError::from).and_then(|hero| {
        let concrete = types.resolve(&hero).map_err(FieldError::from)?;
        Ok((hero, *concrete))
    }) {
        Ok(hero) => hero,
        Err(e) => {
            return ExecutionResult::new(json!({ "hero": null }))
                .with_errors([e.at(path(&hero_path))])
        }
    };

    let friends = characters.load_many(hero.0.friends.clone());
    hook.on_level_complete(1).await;
    let friends = future::join_all(friends).await;

    let friends_of_friends = friends
        .iter()
        .map(|friend| friend.as_ref().ok().map(|f| characters.load_many(f.friends.clone())))
        .collect::<Vec<_>>();
    hook.on_level_complete(2).await;

    let mut friend_values = Vec::new();
    for (i, (friend, nested)) in friends.into_iter().zip(friends_of_friends).enumerate() {
        let friend_path = [hero_path[0].clone(), "friends".into(), PathSegment::Index(i)];
        let (friend, nested) = match (friend, nested) {
            (Ok(friend), Some(nested)) => (friend, nested),
            (Err(e), _) => {
                errors.push(FieldError::from(e).at(path(&friend_path)));
                friend_values.push(Value::Null);
                continue;
            }
            (Ok(_), None) => unreachable!("every loaded friend has nested handles"),
        };
        let mut nested_values = Vec::new();
        for (j, handle) in nested.into_iter().enumerate() {
            match handle.await {
                Ok(c) => nested_values.push(json!({ "name": c.name })),
                Err(e) => {
                    let mut nested_path = path(&friend_path);
                    nested_path.extend(["friends".into(), PathSegment::Index(j)]);
                    errors.push(FieldError::from(e).at(nested_path));
                    nested_values.push(Value::Null);
                }
            }
        }
        friend_values.push(json!({ "name": friend.name, "friends": nested_values }));
    }
    hook.on_execution_complete().await;

    let (hero, concrete) = hero;
    ExecutionResult::new(json!({
        "hero": {
            "__typename": concrete.type_name(),
            "name": hero.name,
            "friends": friend_values,
        }
    }))
    .with_errors(errors)
}

/// Resolves `{ hero { name } starship(id: "3000") { name } }`; nothing wires a `starships`
/// loader, so only the second root field fails.
pub async fn hero_and_starship(ctx: &RequestContext, hook: &dyn ExecutionHook) -> ExecutionResult {
    let mut errors = Vec::new();

    let hero = ctx.loader::<String, Character>(CHARACTERS).map(|l| l.load(R2_D2.to_owned()));
    let starship = ctx.loader::<String, String>("starships").map(|l| l.load("3000".to_owned()));
    hook.on_level_complete(0).await;

    let mut resolve = |field: &str, outcome: Result<String, FieldError>| match outcome {
        Ok(name) => json!({ "name": name }),
        Err(e) => {
            errors.push(e.at([field]));
            Value::Null
        }
    };
    let hero = match hero {
        Ok(handle) => handle.await.map(|c| c.name).map_err(FieldError::from),
        Err(e) => Err(e.into()),
    };
    let hero = resolve("hero", hero);
    let starship = match starship {
        Ok(handle) => handle.await.map_err(FieldError::from),
        Err(e) => Err(e.into()),
    };
    let starship = resolve("starship", starship);

    ExecutionResult::new(json!({ "hero": hero, "starship": starship })).with_errors(errors)
}

pub fn friend_names(result: &ExecutionResult) -> Vec<String> {
    let friends = result
        .data
        .as_ref()
        .and_then(|data| data["hero"]["friends"].as_array().cloned())
        .unwrap_or_default();
    friends.iter().filter_map(|f| f["name"].as_str().map(str::to_owned)).collect()
}
