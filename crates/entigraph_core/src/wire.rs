//! Wire form of entity graphs.
//!
//! Entities become maps of `"id"`, their fields and their encoded relations.
//! Relation payloads have three encodings of increasing fidelity:
//!
//! | payload              | `Plain`        | `Keyed`              | `ExplicitKeyed`            |
//! |----------------------|----------------|----------------------|----------------------------|
//! | id                   | `{"id": …}`    | `{"id": …}`          | `{"id": …}`                |
//! | entity               | entity map     | `{"object": …}`      | `{"object": …}`            |
//! | ids                  | `[id, …]`      | `{"ids": […]}`       | `{"ids": […]}`             |
//! | entities             | `[map, …]`     | `{"objects": […]}`   | `{"objects": […]}`         |
//! | id chunk             | as ids         | as ids               | `{"chunk_ids": […]}`       |
//! | entity chunk         | as entities    | as entities          | `{"chunk": […]}`           |
//! | fragment entity/list | as entity/list | as entity/list       | `{"fragment": …}`          |
//! | fragment chunk       | as entities    | as entities          | `{"fragment_chunk": […]}`  |
//!
//! Decoding accepts all three forms, trying explicit keys, then keyed, then
//! plain.

use entigraph_codec::{from_cbor, from_json_str, to_cbor, to_json_string, CodecError, Value};

use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};
use crate::relation::RelationValue;
use crate::schema::{RelationDef, Schema};

/// Relation payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireEncoding {
    /// Bare ids and entity maps; chunk and fragment markers are lost.
    Plain,
    /// Single-key wrappers distinguishing ids from entities.
    #[default]
    Keyed,
    /// Keyed plus chunk and fragment markers.
    ExplicitKeyed,
}

const ID: &str = "id";
const OBJECT: &str = "object";
const IDS: &str = "ids";
const OBJECTS: &str = "objects";
const CHUNK_IDS: &str = "chunk_ids";
const CHUNK: &str = "chunk";
const FRAGMENT: &str = "fragment";
const FRAGMENT_CHUNK: &str = "fragment_chunk";

/// Encodes an entity with its relation payloads.
#[must_use]
pub fn encode_entity(entity: &Entity, encoding: WireEncoding) -> Value {
    let mut pairs = Vec::with_capacity(1 + entity.fields().len() + entity.relations().len());
    pairs.push((Value::from(ID), Value::from(entity.id().as_str())));
    for (name, value) in entity.fields() {
        pairs.push((Value::from(name.as_str()), value.clone()));
    }
    for (name, relation) in entity.relations() {
        if !relation.is_none() {
            pairs.push((Value::from(name.as_str()), encode_relation(relation, encoding)));
        }
    }
    Value::map(pairs)
}

/// Encodes one relation payload. `None` encodes as null.
#[must_use]
pub fn encode_relation(relation: &RelationValue, encoding: WireEncoding) -> Value {
    let id_array = |ids: &[EntityId]| Value::Array(ids.iter().map(|id| Value::from(id.as_str())).collect());
    let entity_array =
        |entities: &[Entity]| Value::Array(entities.iter().map(|e| encode_entity(e, encoding)).collect());
    let keyed = |key: &str, value: Value| Value::object([(key, value)]);
    let explicit = encoding == WireEncoding::ExplicitKeyed;

    match relation {
        RelationValue::None => Value::Null,
        RelationValue::SingleId(id) => keyed(ID, Value::from(id.as_str())),
        RelationValue::SingleEntity { entity, fragment } => {
            let map = encode_entity(entity, encoding);
            match encoding {
                WireEncoding::Plain => map,
                _ if explicit && *fragment => keyed(FRAGMENT, map),
                _ => keyed(OBJECT, map),
            }
        }
        RelationValue::IdList { ids, chunk } => match encoding {
            WireEncoding::Plain => id_array(ids),
            _ if explicit && *chunk => keyed(CHUNK_IDS, id_array(ids)),
            _ => keyed(IDS, id_array(ids)),
        },
        RelationValue::EntityList {
            entities,
            chunk,
            fragment,
        } => {
            let list = entity_array(entities);
            match encoding {
                WireEncoding::Plain => list,
                _ if explicit && *chunk && *fragment => keyed(FRAGMENT_CHUNK, list),
                _ if explicit && *chunk => keyed(CHUNK, list),
                _ if explicit && *fragment => keyed(FRAGMENT, list),
                _ => keyed(OBJECTS, list),
            }
        }
    }
}

/// Decodes an entity of `type_name`.
///
/// Keys naming a declared relation are decoded as relation payloads, every
/// other key except `"id"` as a field.
///
/// # Errors
///
/// Returns `UnknownType` for an unregistered type and
/// `CodecError::InvalidStructure` for a malformed payload.
pub fn decode_entity(schema: &Schema, type_name: &str, value: &Value) -> CoreResult<Entity> {
    let entity_schema = schema.require(type_name)?;
    let pairs = value
        .as_map()
        .ok_or_else(|| malformed(format!("{type_name}: expected a map, found {}", value.kind())))?;
    let id = value
        .get(ID)
        .and_then(Value::as_text)
        .ok_or_else(|| malformed(format!("{type_name}: missing text \"id\"")))?;

    let mut entity = Entity::new(entity_schema.name(), id);
    for (key, field) in pairs {
        let key = key
            .as_text()
            .ok_or_else(|| malformed(format!("{type_name} {id}: non-text key {key}")))?;
        if key == ID {
            continue;
        }
        match entity_schema.relation(key) {
            Some(def) => entity.set_relation(key, decode_relation(schema, def, field)?),
            None => entity.set_field(key, field.clone()),
        }
    }
    Ok(entity)
}

/// Decodes one relation payload declared by `def`.
///
/// # Errors
///
/// Returns `CodecError::InvalidStructure` when the value has no accepted
/// shape.
pub fn decode_relation(schema: &Schema, def: &RelationDef, value: &Value) -> CoreResult<RelationValue> {
    let target = def.target.as_str();
    let entity = |value: &Value| decode_entity(schema, target, value);
    let entities = |value: &Value| -> CoreResult<Vec<Entity>> {
        value
            .as_array()
            .ok_or_else(|| malformed(format!("{}: expected a list of entities", def.name)))?
            .iter()
            .map(|item| decode_entity(schema, target, item))
            .collect()
    };

    if value.is_null() {
        return Ok(RelationValue::None);
    }

    if let Some([(key, inner)]) = value.as_map() {
        match key.as_text() {
            Some(CHUNK_IDS) => return Ok(RelationValue::chunk_ids(decode_ids(def, inner)?)),
            Some(CHUNK) => return Ok(RelationValue::entity_list(entities(inner)?, true, false)),
            Some(FRAGMENT_CHUNK) => return Ok(RelationValue::entity_list(entities(inner)?, true, true)),
            Some(FRAGMENT) if inner.as_array().is_some() => {
                return Ok(RelationValue::entity_list(entities(inner)?, false, true));
            }
            Some(FRAGMENT) => return Ok(RelationValue::fragment(entity(inner)?)),
            Some(ID) => {
                let id = inner
                    .as_text()
                    .ok_or_else(|| malformed(format!("{}: id must be text", def.name)))?;
                return Ok(RelationValue::id(id));
            }
            Some(OBJECT) => return Ok(RelationValue::entity(entity(inner)?)),
            Some(IDS) => return Ok(RelationValue::ids(decode_ids(def, inner)?)),
            Some(OBJECTS) => return Ok(RelationValue::entity_list(entities(inner)?, false, false)),
            _ => {}
        }
    }

    match value {
        Value::Map(_) if value.get(ID).is_some() => Ok(RelationValue::entity(entity(value)?)),
        Value::Array(items) if items.iter().all(|item| item.as_text().is_some()) => {
            Ok(RelationValue::ids(decode_ids(def, value)?))
        }
        Value::Array(items) if items.iter().all(|item| item.as_map().is_some()) => {
            Ok(RelationValue::entity_list(entities(value)?, false, false))
        }
        other => Err(malformed(format!("{}: unrecognized relation payload {other}", def.name))),
    }
}

fn decode_ids(def: &RelationDef, value: &Value) -> CoreResult<Vec<EntityId>> {
    value
        .as_array()
        .ok_or_else(|| malformed(format!("{}: expected a list of ids", def.name)))?
        .iter()
        .map(|item| {
            item.as_text()
                .map(EntityId::from)
                .ok_or_else(|| malformed(format!("{}: ids must be text", def.name)))
        })
        .collect()
}

fn malformed(message: String) -> CoreError {
    CoreError::Codec(CodecError::invalid_structure(message))
}

/// Encodes an entity to CBOR bytes.
///
/// # Errors
///
/// Returns a codec error if encoding fails.
pub fn entity_to_cbor(entity: &Entity, encoding: WireEncoding) -> CoreResult<Vec<u8>> {
    Ok(to_cbor(&encode_entity(entity, encoding))?)
}

/// Decodes an entity from CBOR bytes.
///
/// # Errors
///
/// Returns a codec error for undecodable bytes or a malformed payload.
pub fn entity_from_cbor(schema: &Schema, type_name: &str, bytes: &[u8]) -> CoreResult<Entity> {
    decode_entity(schema, type_name, &from_cbor(bytes)?)
}

/// Encodes an entity to JSON text.
///
/// # Errors
///
/// Returns a codec error if encoding fails.
pub fn entity_to_json(entity: &Entity, encoding: WireEncoding) -> CoreResult<String> {
    Ok(to_json_string(&encode_entity(entity, encoding))?)
}

/// Decodes an entity from JSON text.
///
/// # Errors
///
/// Returns a codec error for invalid JSON or a malformed payload.
pub fn entity_from_json(schema: &Schema, type_name: &str, text: &str) -> CoreResult<Entity> {
    decode_entity(schema, type_name, &from_json_str(text)?)
}
