use std::collections::{HashMap, HashSet};

use regex::Regex;
use similar::{capture_diff_slices, Algorithm, DiffTag};
use veridiff_error::VeridiffError;
use veridiff_types::{make_difference, Canon, DiffGroup, Difference, Differences, Value};

use crate::data::{Data, DataEntry};
use crate::requirement::{Predicate, PredicateReply, Requirement};

/// One side of a per-element comparison: absent, a single element, or a
/// container of elements (in its original shape).
enum EntryKind {
    NotFound,
    Element(Value),
    Collection(Value),
}

/// What one strategy application produced.
///
/// `Single` is a lone difference from single-element data; `Flat` is the
/// list a container produced (kept as a list even when it holds one
/// difference); `Keyed` is the sequence strategy's index-pair mapping.
enum StrategyResult {
    Pass,
    Single(Difference),
    Flat(Vec<Difference>),
    Keyed(Vec<((usize, usize), Difference)>),
}

impl StrategyResult {
    fn into_group(self) -> Option<DiffGroup> {
        match self {
            Self::Pass => None,
            Self::Single(diff) => Some(DiffGroup::One(diff)),
            Self::Flat(items) if items.is_empty() => None,
            Self::Flat(items) => Some(DiffGroup::Many(items)),
            Self::Keyed(pairs) if pairs.is_empty() => None,
            Self::Keyed(pairs) => {
                Some(DiffGroup::Many(pairs.into_iter().map(|(_, d)| d).collect()))
            }
        }
    }
}

/// Compare data against a requirement.
///
/// `Ok(None)` means the data satisfies the requirement. Otherwise the
/// default failure message is returned together with the differences
/// found. Programming errors (bad data shape for the strategy, a
/// predicate returning garbage) come back as `Err`.
pub fn compare(
    data: Data,
    requirement: &Requirement,
) -> Result<Option<(String, Differences)>, VeridiffError> {
    // A mapping requirement always wins, whatever shape the data has.
    if let Requirement::Map(req_pairs) = requirement {
        let entries = mapping_entries(data)?;
        let groups = apply_mapping_requirement(entries, req_pairs)?;
        return Ok(finish_mapping(
            requirement.default_message(true),
            groups,
        ));
    }

    match data {
        Data::Mapping(entries) => {
            // Mapping data counts as a single element for message
            // selection; the requirement applies per entry.
            let message = requirement.default_message(true);
            let groups = apply_requirement_per_entry(entries, requirement)?;
            Ok(finish_mapping(message, groups))
        }
        Data::Element(value) => {
            let message = requirement.default_message(true);
            let result = apply_strategy(EntryKind::Element(value), requirement)?;
            Ok(finish_flat(message, result))
        }
        Data::Collection(value) => {
            let message = requirement.default_message(false);
            let result = apply_strategy(EntryKind::Collection(value), requirement)?;
            Ok(finish_flat(message, result))
        }
        Data::Stream(stream) => {
            let message = requirement.default_message(false);
            let collected = Value::List(stream.collect());
            let result = apply_strategy(EntryKind::Collection(collected), requirement)?;
            Ok(finish_flat(message, result))
        }
    }
}

fn finish_mapping(
    message: String,
    groups: Vec<(Value, DiffGroup)>,
) -> Option<(String, Differences)> {
    if groups.is_empty() {
        None
    } else {
        Some((message, Differences::Map(groups)))
    }
}

fn finish_flat(message: String, result: StrategyResult) -> Option<(String, Differences)> {
    match result {
        StrategyResult::Pass => None,
        StrategyResult::Single(diff) => Some((message, Differences::List(vec![diff]))),
        StrategyResult::Flat(items) if items.is_empty() => None,
        StrategyResult::Flat(items) => Some((message, Differences::List(items))),
        StrategyResult::Keyed(pairs) if pairs.is_empty() => None,
        StrategyResult::Keyed(pairs) => {
            let groups = pairs
                .into_iter()
                .map(|((i, j), diff)| {
                    let key = Value::Tuple(vec![Value::from(i), Value::from(j)]);
                    (key, DiffGroup::One(diff))
                })
                .collect();
            Some((message, Differences::Map(groups)))
        }
    }
}

/// Realize data as mapping entries for a mapping requirement.
///
/// Accepts mapping-shaped data directly and collections of two-tuple
/// key/value pairs; anything else is a shape error.
fn mapping_entries(data: Data) -> Result<Vec<(Value, DataEntry)>, VeridiffError> {
    match data {
        Data::Mapping(entries) => Ok(entries),
        Data::Collection(value) => entries_from_pairs(collection_items(value)),
        Data::Stream(stream) => entries_from_pairs(stream.collect()),
        Data::Element(value) => Err(VeridiffError::MappingShape {
            data_shape: value.type_name(),
        }),
    }
}

fn entries_from_pairs(items: Vec<Value>) -> Result<Vec<(Value, DataEntry)>, VeridiffError> {
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let shape = item.type_name();
        match item {
            Value::Tuple(kv) if kv.len() == 2 => {
                let mut parts = kv.into_iter();
                if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                    entries.push((key, DataEntry::from_value(value)));
                }
            }
            _ => return Err(VeridiffError::MappingShape { data_shape: shape }),
        }
    }
    Ok(entries)
}

fn collection_items(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => items,
        other => vec![other],
    }
}

fn entry_kind(entry: DataEntry) -> EntryKind {
    match entry {
        DataEntry::Element(value) => EntryKind::Element(value),
        DataEntry::Collection(value) => EntryKind::Collection(value),
        DataEntry::Stream(stream) => EntryKind::Collection(Value::List(stream.collect())),
    }
}

/// Mapping data against a mapping requirement: data keys first, then the
/// requirement-only keys, each with the sub-requirement's own strategy.
fn apply_mapping_requirement(
    entries: Vec<(Value, DataEntry)>,
    req_pairs: &[(Value, Requirement)],
) -> Result<Vec<(Value, DiffGroup)>, VeridiffError> {
    let mut req_index: HashMap<Canon, usize> = HashMap::new();
    for (i, (key, _)) in req_pairs.iter().enumerate() {
        req_index.entry(key.canon()).or_insert(i);
    }

    let mut data_keys: HashSet<Canon> = HashSet::new();
    let mut out = Vec::new();

    for (key, entry) in entries {
        let canon = key.canon();
        data_keys.insert(canon.clone());
        let entry = entry_kind(entry);
        let result = match req_index.get(&canon) {
            Some(&i) => flatten_keyed(apply_strategy(entry, &req_pairs[i].1)?),
            // No requirement for this key: everything in it is extra.
            None => apply_missing_requirement(entry),
        };
        if let Some(group) = result.into_group() {
            out.push((key, group));
        }
    }

    for (key, sub) in req_pairs {
        if !data_keys.contains(&key.canon()) {
            let result = flatten_keyed(apply_strategy(EntryKind::NotFound, sub)?);
            if let Some(group) = result.into_group() {
                out.push((key.clone(), group));
            }
        }
    }

    Ok(out)
}

/// Mapping data against a non-mapping requirement: the requirement is
/// applied to every entry. An equality requirement compares each entry as
/// one whole value; other strategies handle the entry's own shape.
fn apply_requirement_per_entry(
    entries: Vec<(Value, DataEntry)>,
    requirement: &Requirement,
) -> Result<Vec<(Value, DiffGroup)>, VeridiffError> {
    let mut out = Vec::new();
    for (key, entry) in entries {
        let entry = entry_kind(entry);
        let result = match requirement {
            Requirement::Equal(other) => {
                let value = entry_value(entry);
                if value.semantic_eq(other) {
                    StrategyResult::Pass
                } else {
                    StrategyResult::Single(make_difference(Some(&value), Some(other), true))
                }
            }
            _ => flatten_keyed(apply_strategy(entry, requirement)?),
        };
        if let Some(group) = result.into_group() {
            out.push((key, group));
        }
    }
    Ok(out)
}

fn entry_value(entry: EntryKind) -> Value {
    match entry {
        EntryKind::NotFound => Value::Null,
        EntryKind::Element(value) | EntryKind::Collection(value) => value,
    }
}

/// Inside a mapping, the sequence strategy's index-pair result flattens
/// into the key's difference list in index order.
fn flatten_keyed(result: StrategyResult) -> StrategyResult {
    match result {
        StrategyResult::Keyed(pairs) => {
            StrategyResult::Flat(pairs.into_iter().map(|(_, d)| d).collect())
        }
        other => other,
    }
}

fn apply_strategy(
    entry: EntryKind,
    requirement: &Requirement,
) -> Result<StrategyResult, VeridiffError> {
    match requirement {
        Requirement::Sequence(sequence) => require_sequence(entry, sequence),
        Requirement::Set(items) => Ok(require_set(entry, items)),
        Requirement::Predicate(predicate) => require_predicate(entry, predicate),
        Requirement::Regex(pattern) => Ok(require_regex(entry, pattern)),
        Requirement::Equal(other) => Ok(require_equal(entry, other)),
        Requirement::Map(_) => Ok(require_map_value(entry, requirement)),
    }
}

/// A map nested below another requirement compares as a plain value.
fn require_map_value(entry: EntryKind, requirement: &Requirement) -> StrategyResult {
    match requirement.value_image() {
        Some(image) => require_equal(entry, &image),
        // A nested map holding predicates has no value image; nothing
        // can satisfy it as a plain value.
        None => StrategyResult::Single(Difference::invalid(entry_value(entry))),
    }
}

fn require_sequence(
    entry: EntryKind,
    sequence: &[Value],
) -> Result<StrategyResult, VeridiffError> {
    let items = match entry {
        EntryKind::NotFound => {
            // No data at all: every required element is missing.
            let diffs = sequence
                .iter()
                .map(|v| Difference::missing(v.clone()))
                .collect();
            return Ok(StrategyResult::Flat(diffs));
        }
        EntryKind::Element(value) => {
            return Err(VeridiffError::SequenceShape {
                data_shape: value.type_name(),
            });
        }
        EntryKind::Collection(value) => match value {
            Value::List(items) | Value::Tuple(items) => items,
            other => {
                return Err(VeridiffError::SequenceShape {
                    data_shape: other.type_name(),
                });
            }
        },
    };

    let data_proxy: Vec<Canon> = items.iter().map(Value::canon).collect();
    let seq_proxy: Vec<Canon> = sequence.iter().map(Value::canon).collect();

    let mut out = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &data_proxy, &seq_proxy) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag != DiffTag::Equal {
            append_diff(&mut out, &items, sequence, (old.start, old.end), (new.start, new.end));
        }
    }
    Ok(StrategyResult::Keyed(out))
}

/// Walk one non-equal opcode, keying each difference by its
/// `(data_index, requirement_index)` position.
fn append_diff(
    out: &mut Vec<((usize, usize), Difference)>,
    data: &[Value],
    sequence: &[Value],
    (i1, i2): (usize, usize),
    (j1, j2): (usize, usize),
) {
    if j1 == j2 {
        for i in i1..i2 {
            out.push(((i, j1), Difference::extra(data[i].clone())));
        }
    } else if i1 == i2 {
        for j in j1..j2 {
            out.push(((i1, j), Difference::missing(sequence[j].clone())));
        }
    } else {
        let shortest = (i2 - i1).min(j2 - j1);
        for offset in 0..shortest {
            let (i, j) = (i1 + offset, j1 + offset);
            out.push((
                (i, j),
                Difference::invalid_expected(data[i].clone(), sequence[j].clone()),
            ));
        }
        if i1 + shortest != i2 || j1 + shortest != j2 {
            append_diff(out, data, sequence, (i1 + shortest, i2), (j1 + shortest, j2));
        }
    }
}

fn require_set(entry: EntryKind, requirement: &[Value]) -> StrategyResult {
    let elements = match entry {
        EntryKind::NotFound => Vec::new(),
        EntryKind::Element(value) => vec![value],
        EntryKind::Collection(value) => collection_items(value),
    };

    let req_canons: Vec<Canon> = requirement.iter().map(Value::canon).collect();
    let membership: HashSet<&Canon> = req_canons.iter().collect();

    let mut matched: HashSet<Canon> = HashSet::new();
    let mut extra_seen: HashSet<Canon> = HashSet::new();
    let mut extras: Vec<Value> = Vec::new();
    for element in elements {
        let canon = element.canon();
        if membership.contains(&canon) {
            matched.insert(canon);
        } else if extra_seen.insert(canon) {
            extras.push(element);
        }
    }

    let mut out: Vec<Difference> = Vec::new();
    let mut missing_seen: HashSet<&Canon> = HashSet::new();
    for (value, canon) in requirement.iter().zip(&req_canons) {
        if !matched.contains(canon) && missing_seen.insert(canon) {
            out.push(Difference::missing(value.clone()));
        }
    }
    out.extend(extras.into_iter().map(Difference::extra));
    StrategyResult::Flat(out)
}

fn require_predicate(
    entry: EntryKind,
    predicate: &Predicate,
) -> Result<StrategyResult, VeridiffError> {
    match entry {
        EntryKind::NotFound => Ok(StrategyResult::Single(Difference::invalid(Value::Null))),
        EntryKind::Element(value) => Ok(match eval_element(predicate, &value)? {
            Some(diff) => StrategyResult::Single(diff),
            None => StrategyResult::Pass,
        }),
        EntryKind::Collection(value) => {
            let mut out = Vec::new();
            for element in collection_items(value) {
                if let Some(diff) = eval_element(predicate, &element)? {
                    out.push(diff);
                }
            }
            Ok(StrategyResult::Flat(out))
        }
    }
}

fn eval_element(
    predicate: &Predicate,
    element: &Value,
) -> Result<Option<Difference>, VeridiffError> {
    match predicate.eval(element.fields()) {
        // Evaluation failure counts as a failed check, not a crash.
        Err(_) => Ok(Some(Difference::invalid(element.clone()))),
        Ok(PredicateReply::Pass) => Ok(None),
        Ok(PredicateReply::Fail) => Ok(Some(Difference::invalid(element.clone()))),
        Ok(PredicateReply::Diff(diff)) => Ok(Some(diff)),
        Ok(PredicateReply::Other(value)) => Err(VeridiffError::PredicateReturn {
            callable: predicate.name().to_owned(),
            reply: value.to_string(),
        }),
    }
}

fn require_regex(entry: EntryKind, pattern: &Regex) -> StrategyResult {
    let matches = |element: &Value| {
        element
            .as_text()
            .map_or(false, |text| pattern.is_match(text))
    };
    match entry {
        EntryKind::NotFound => StrategyResult::Single(Difference::invalid(Value::Null)),
        EntryKind::Element(value) => {
            if matches(&value) {
                StrategyResult::Pass
            } else {
                StrategyResult::Single(Difference::invalid(value))
            }
        }
        EntryKind::Collection(value) => StrategyResult::Flat(
            collection_items(value)
                .into_iter()
                .filter(|element| !matches(element))
                .map(Difference::invalid)
                .collect(),
        ),
    }
}

fn require_equal(entry: EntryKind, other: &Value) -> StrategyResult {
    match entry {
        EntryKind::NotFound => {
            StrategyResult::Single(make_difference(None, Some(other), true))
        }
        EntryKind::Element(value) => {
            if value.semantic_eq(other) {
                StrategyResult::Pass
            } else {
                StrategyResult::Single(make_difference(Some(&value), Some(other), true))
            }
        }
        EntryKind::Collection(value) => {
            let mut out = Vec::new();
            for element in collection_items(value) {
                if !element.semantic_eq(other) {
                    out.push(make_difference(Some(&element), Some(other), false));
                }
            }
            StrategyResult::Flat(out)
        }
    }
}

/// A data key with no requirement entry: every element in it is extra.
fn apply_missing_requirement(entry: EntryKind) -> StrategyResult {
    match entry {
        EntryKind::NotFound => StrategyResult::Pass,
        EntryKind::Element(value) => {
            StrategyResult::Single(make_difference(Some(&value), None, true))
        }
        EntryKind::Collection(value) => StrategyResult::Flat(
            collection_items(value)
                .iter()
                .map(|element| make_difference(Some(element), None, false))
                .collect(),
        ),
    }
}
