//! Mutation apply logic.
//!
//! Patches are applied to a copy of the target document and committed only
//! if every operation succeeds, so a failing patch leaves the pair as it was.

use serde_json::{Map, Number, Value};
use structdiff_path::{get, get_mut, index_of_key, Path, PathSegment};

use super::types::{InsertPosition, Mutation, PatchOp};
use crate::error::MutationError;
use crate::value::{DocumentPair, ID_ATTRIBUTE};

// ── Path navigation ───────────────────────────────────────────────────────

/// Mutable navigation to the parent of `path`, creating missing objects
/// along the way when `create` is set.
fn parent_mut<'a>(
    doc: &'a mut Value,
    path: &[PathSegment],
    create: bool,
) -> Result<&'a mut Value, MutationError> {
    let mut current = doc;
    for segment in path {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(k)) => {
                if create {
                    map.entry(k.clone()).or_insert_with(|| Value::Object(Map::new()))
                } else {
                    map.get_mut(k).ok_or_else(|| not_found(path))?
                }
            }
            (Value::Array(arr), PathSegment::Index(i)) => {
                arr.get_mut(*i).ok_or_else(|| not_found(path))?
            }
            (Value::Array(arr), PathSegment::Keyed { key }) => {
                let idx = index_of_key(arr, key).ok_or_else(|| not_found(path))?;
                &mut arr[idx]
            }
            _ => return Err(MutationError::InvalidTarget(Path::new(path.to_vec()).to_string())),
        };
    }
    Ok(current)
}

fn not_found(path: &[PathSegment]) -> MutationError {
    MutationError::PathNotFound(Path::new(path.to_vec()).to_string())
}

fn split_last(path: &Path) -> Option<(&[PathSegment], &PathSegment)> {
    let (last, parent) = path.segments().split_last()?;
    Some((parent, last))
}

// ── Individual operation applicators ─────────────────────────────────────

fn apply_set(doc: &mut Value, path: &Path, value: Value) -> Result<(), MutationError> {
    let Some((parent_path, last)) = split_last(path) else {
        *doc = value;
        return Ok(());
    };
    let parent = parent_mut(doc, parent_path, true)?;
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(k)) => {
            map.insert(k.clone(), value);
            Ok(())
        }
        (Value::Array(arr), PathSegment::Index(i)) if *i < arr.len() => {
            arr[*i] = value;
            Ok(())
        }
        (Value::Array(arr), PathSegment::Keyed { key }) => {
            let idx = index_of_key(arr, key).ok_or_else(|| not_found(path))?;
            arr[idx] = value;
            Ok(())
        }
        (Value::Array(_), PathSegment::Index(_)) => Err(not_found(path)),
        _ => Err(MutationError::InvalidTarget(path.to_string())),
    }
}

fn apply_unset(doc: &mut Value, path: &Path) -> Result<(), MutationError> {
    let Some((parent_path, last)) = split_last(path) else {
        return Err(MutationError::InvalidTarget(path.to_string()));
    };
    let Some(parent) = get_mut(doc, parent_path) else {
        return Ok(());
    };
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(k)) => {
            map.shift_remove(k);
        }
        (Value::Array(arr), PathSegment::Index(i)) if *i < arr.len() => {
            arr.remove(*i);
        }
        (Value::Array(arr), PathSegment::Keyed { key }) => {
            if let Some(idx) = index_of_key(arr, key) {
                arr.remove(idx);
            }
        }
        _ => {}
    }
    Ok(())
}

fn apply_insert(
    doc: &mut Value,
    position: InsertPosition,
    path: &Path,
    items: &[Value],
) -> Result<(), MutationError> {
    let Some((parent_path, last)) = split_last(path) else {
        return Err(MutationError::InvalidTarget(path.to_string()));
    };
    let Some(Value::Array(arr)) = get_mut(doc, parent_path) else {
        return Err(MutationError::InvalidTarget(path.to_string()));
    };
    // An index past the end addresses the end of the array.
    let (idx, exists) = match last {
        PathSegment::Index(i) => ((*i).min(arr.len()), *i < arr.len()),
        PathSegment::Keyed { key } => (index_of_key(arr, key).ok_or_else(|| not_found(path))?, true),
        PathSegment::Key(_) => return Err(MutationError::InvalidTarget(path.to_string())),
    };
    let at = match position {
        InsertPosition::Before => idx,
        InsertPosition::After if exists => idx + 1,
        InsertPosition::After => idx,
        InsertPosition::Replace => {
            if !exists {
                return Err(not_found(path));
            }
            arr.remove(idx);
            idx
        }
    };
    arr.splice(at..at, items.iter().cloned());
    Ok(())
}

fn apply_inc(doc: &mut Value, path: &Path, amount: f64) -> Result<(), MutationError> {
    let Some(target) = get_mut(doc, path) else {
        return Ok(());
    };
    let Value::Number(n) = target else {
        return Err(MutationError::NotANumber(path.to_string()));
    };
    let next = match n.as_i64() {
        Some(i) if amount.fract() == 0.0 => Number::from(i + amount as i64),
        _ => {
            let f = n.as_f64().ok_or_else(|| MutationError::NotANumber(path.to_string()))?;
            Number::from_f64(f + amount).ok_or_else(|| MutationError::NotANumber(path.to_string()))?
        }
    };
    *target = Value::Number(next);
    Ok(())
}

/// Apply one patch operation to a document.
pub fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), MutationError> {
    match op {
        PatchOp::Set { path, value } => apply_set(doc, path, value.clone()),
        PatchOp::SetIfMissing { path, value } => {
            if get(doc, path).is_none() {
                apply_set(doc, path, value.clone())
            } else {
                Ok(())
            }
        }
        PatchOp::Unset { path } => apply_unset(doc, path),
        PatchOp::Insert {
            position,
            path,
            items,
        } => apply_insert(doc, *position, path, items),
        PatchOp::Inc { path, amount } => apply_inc(doc, path, *amount),
        PatchOp::Dec { path, amount } => apply_inc(doc, path, -*amount),
    }
}

/// Apply a list of operations atomically.
pub fn apply_ops(doc: &Value, ops: &[PatchOp]) -> Result<Value, MutationError> {
    let mut next = doc.clone();
    for op in ops {
        apply_op(&mut next, op)?;
    }
    Ok(next)
}

fn created_id(doc: &Value) -> Result<&str, MutationError> {
    doc.get(ID_ATTRIBUTE)
        .and_then(Value::as_str)
        .ok_or_else(|| MutationError::Invalid("document has no _id".to_string()))
}

/// Apply a mutation to the draft or published slot of `pair`, chosen by the
/// target document id.
pub fn apply_mutation(pair: &mut DocumentPair, mutation: &Mutation) -> Result<(), MutationError> {
    match mutation {
        Mutation::Create(doc) => {
            let id = created_id(doc)?;
            let slot = pair.slot_mut(id);
            if slot.is_some() {
                return Err(MutationError::AlreadyExists(id.to_string()));
            }
            *slot = Some(doc.clone());
        }
        Mutation::CreateIfNotExists(doc) => {
            let slot = pair.slot_mut(created_id(doc)?);
            if slot.is_none() {
                *slot = Some(doc.clone());
            }
        }
        Mutation::CreateOrReplace(doc) => {
            *pair.slot_mut(created_id(doc)?) = Some(doc.clone());
        }
        Mutation::Delete { id } => {
            *pair.slot_mut(id) = None;
        }
        Mutation::Patch(patch) => {
            let slot = pair.slot_mut(&patch.id);
            let doc = slot
                .as_ref()
                .ok_or_else(|| MutationError::DocumentNotFound(patch.id.clone()))?;
            *slot = Some(apply_ops(doc, &patch.ops)?);
        }
    }
    Ok(())
}
