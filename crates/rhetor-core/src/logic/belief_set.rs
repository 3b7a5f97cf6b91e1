//! Belief-set construction from model output
//!
//! The model proposes sorts, predicates and formulas as JSON. Nothing it
//! writes reaches the solver until it has been corrected, filtered and
//! validated here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::{extract_json_block, LogicError};

static LOWERCASE_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z_][a-z0-9_]*\b").expect("LOWERCASE_TERM regex should compile"));
static QUANTIFIED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:forall|exists)\s+([A-Z][a-zA-Z0-9_]*)\s*:").expect("QUANTIFIED_VAR regex should compile")
});
static PREDICATE_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-zA-Z0-9_]*)\(([^()]*)\)").expect("PREDICATE_USE regex should compile")
});
static SORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\w+)\s*=\s*\{([^}]*)\}").expect("SORT_DECL regex should compile")
});
static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"type\((\w+)(?:\(([^)]*)\))?\)").expect("TYPE_DECL regex should compile")
});
static PL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-z_][a-z0-9_]*|<=>|=>|&&|\|\||!|\(|\)|\S").expect("PL_TOKEN regex should compile")
});
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("IDENTIFIER regex should compile"));

const QUANTIFIERS: [&str; 2] = ["forall", "exists"];

/// Snake-case an identifier: accents stripped, whitespace runs become `_`,
/// anything outside `[A-Za-z0-9_]` dropped, lowercased.
pub fn normalize_identifier(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

fn split_args(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    args.split(',').map(|a| a.trim().to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredicateDecl {
    pub name: String,
    /// Sort names, one per argument
    #[serde(default)]
    pub args: Vec<String>,
}

/// First-order knowledge base as proposed by the model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBase {
    /// Sort name -> constants of that sort
    #[serde(default)]
    pub sorts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub predicates: Vec<PredicateDecl>,
    #[serde(default)]
    pub formulas: Vec<String>,
}

impl KnowledgeBase {
    /// Parse the JSON object embedded in a model answer
    pub fn from_model_output(text: &str) -> Result<Self, LogicError> {
        let block = extract_json_block(text);
        serde_json::from_str(&block)
            .map_err(|e| LogicError::InvalidBeliefSet(format!("knowledge base is not valid JSON: {}", e)))
    }

    pub fn constants(&self) -> BTreeSet<&str> {
        self.sorts.values().flatten().map(String::as_str).collect()
    }

    fn sort_of(&self, constant: &str) -> Option<&str> {
        self.sorts
            .iter()
            .find(|(_, constants)| constants.iter().any(|c| c == constant))
            .map(|(sort, _)| sort.as_str())
    }

    /// Replace predicate arguments that name a constant with that constant's
    /// sort. Returns how many arguments were rewritten.
    pub fn correct_predicate_args(&mut self) -> usize {
        let mut fixes = Vec::new();
        for (p, pred) in self.predicates.iter().enumerate() {
            for (a, arg) in pred.args.iter().enumerate() {
                if self.sorts.contains_key(arg) {
                    continue;
                }
                if let Some(sort) = self.sort_of(arg) {
                    fixes.push((p, a, sort.to_string()));
                }
            }
        }
        for (p, a, sort) in &fixes {
            tracing::debug!(
                predicate = %self.predicates[*p].name,
                from = %self.predicates[*p].args[*a],
                to = %sort,
                "corrected predicate argument"
            );
            self.predicates[*p].args[*a] = sort.clone();
        }
        fixes.len()
    }

    /// Drop formulas mentioning a lowercase term that is not a declared
    /// constant. Returns how many were dropped.
    pub fn filter_formulas(&mut self) -> usize {
        let constants: BTreeSet<String> = self.constants().into_iter().map(str::to_string).collect();
        let before = self.formulas.len();
        self.formulas.retain(|formula| {
            let stray = LOWERCASE_TERM
                .find_iter(formula)
                .map(|m| m.as_str())
                .find(|term| !QUANTIFIERS.contains(term) && !constants.contains(*term));
            match stray {
                Some(term) => {
                    tracing::info!(%formula, %term, "dropping formula with undeclared term");
                    false
                }
                None => true,
            }
        });
        let dropped = before - self.formulas.len();
        tracing::info!(kept = self.formulas.len(), total = before, "filtered formulas");
        dropped
    }

    /// Normalize every constant and rewrite its occurrences in formulas
    pub fn normalize(&mut self) {
        let mut renames = Vec::new();
        for constants in self.sorts.values_mut() {
            for c in constants.iter_mut() {
                let normalized = normalize_identifier(c);
                if normalized != *c {
                    renames.push((c.clone(), normalized.clone()));
                    *c = normalized;
                }
            }
        }
        for (from, to) in renames {
            let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(&from))) else {
                continue;
            };
            for formula in self.formulas.iter_mut() {
                *formula = re.replace_all(formula, to.as_str()).into_owned();
            }
        }
    }

    /// Check declarations and every formula against them
    pub fn validate(&self) -> Result<(), LogicError> {
        let constants = self.constants();
        let mut arities = BTreeMap::new();
        for pred in &self.predicates {
            if let Some(arg) = pred.args.iter().find(|a| !self.sorts.contains_key(*a)) {
                return Err(LogicError::InvalidBeliefSet(format!(
                    "predicate '{}' uses undeclared sort '{}'",
                    pred.name, arg
                )));
            }
            arities.insert(pred.name.as_str(), pred.args.len());
        }

        for formula in &self.formulas {
            let bound: BTreeSet<&str> = QUANTIFIED_VAR
                .captures_iter(formula)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();

            for cap in PREDICATE_USE.captures_iter(formula) {
                let name = &cap[1];
                let args = split_args(&cap[2]);
                let Some(&arity) = arities.get(name) else {
                    return Err(LogicError::InvalidBeliefSet(format!(
                        "predicate '{}' in '{}' is not declared",
                        name, formula
                    )));
                };
                if arity != args.len() {
                    return Err(LogicError::InvalidBeliefSet(format!(
                        "arity mismatch for '{}': declared {}, used {} in '{}'",
                        name,
                        arity,
                        args.len(),
                        formula
                    )));
                }
                for arg in &args {
                    match arg.chars().next() {
                        Some(c) if c.is_lowercase() && !constants.contains(arg.as_str()) => {
                            return Err(LogicError::InvalidBeliefSet(format!(
                                "constant '{}' in '{}' is not declared in any sort",
                                arg, formula
                            )));
                        }
                        Some(c) if c.is_uppercase() && !bound.contains(arg.as_str()) => {
                            return Err(LogicError::InvalidBeliefSet(format!(
                                "variable '{}' in '{}' is not bound by forall/exists",
                                arg, formula
                            )));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Tweety FOL syntax: sort declarations, type declarations, a blank line,
    /// then one formula per line.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for (sort, constants) in &self.sorts {
            if !constants.is_empty() {
                lines.push(format!("{} = {{ {} }}", sort, constants.join(", ")));
            }
        }
        for pred in &self.predicates {
            if pred.args.is_empty() {
                lines.push(format!("type({})", pred.name));
            } else {
                lines.push(format!("type({}({}))", pred.name, pred.args.join(", ")));
            }
        }
        if !self.formulas.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(
                self.formulas
                    .iter()
                    .map(|f| f.trim().trim_end_matches(';').to_string()),
            );
        }
        lines.join("\n")
    }

    /// Correct, filter, normalize and validate, then render
    pub fn prepare(mut self) -> Result<String, LogicError> {
        self.correct_predicate_args();
        self.filter_formulas();
        self.normalize();
        self.validate()?;
        let rendered = self.render();
        if rendered.trim().is_empty() {
            return Err(LogicError::InvalidBeliefSet(
                "knowledge base renders to nothing".to_string(),
            ));
        }
        Ok(rendered)
    }
}

/// Predicates and constants recovered from a rendered FOL belief set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    pub predicates: BTreeMap<String, usize>,
    pub constants: BTreeSet<String>,
}

impl Declarations {
    pub fn parse(content: &str) -> Self {
        let mut decl = Self::default();
        for cap in SORT_DECL.captures_iter(content) {
            decl.constants.extend(split_args(&cap[2]).into_iter().filter(|c| !c.is_empty()));
        }
        for cap in TYPE_DECL.captures_iter(content) {
            let arity = cap.get(2).map(|m| split_args(m.as_str()).len()).unwrap_or(0);
            decl.predicates.insert(cap[1].to_string(), arity);
        }
        decl
    }

    /// Check a FOL query against the declarations: known predicates with the
    /// right arity, declared constants, bound variables.
    pub fn check_query(&self, query: &str) -> Result<(), LogicError> {
        let query = query.trim();
        if self.predicates.get(query) == Some(&0) {
            return Ok(());
        }
        let bound: BTreeSet<&str> = QUANTIFIED_VAR
            .captures_iter(query)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let mut uses = 0;
        for cap in PREDICATE_USE.captures_iter(query) {
            uses += 1;
            let name = &cap[1];
            let args = split_args(&cap[2]);
            match self.predicates.get(name) {
                None => return Err(LogicError::InvalidQuery(format!("unknown predicate '{}'", name))),
                Some(&arity) if arity != args.len() => {
                    return Err(LogicError::InvalidQuery(format!(
                        "'{}' expects {} arguments, got {}",
                        name,
                        arity,
                        args.len()
                    )))
                }
                Some(_) => {}
            }
            for arg in &args {
                let known = match arg.chars().next() {
                    Some(c) if c.is_uppercase() => bound.contains(arg.as_str()),
                    _ => self.constants.contains(arg),
                };
                if !known {
                    return Err(LogicError::InvalidQuery(format!(
                        "'{}' in '{}' is neither a declared constant nor a bound variable",
                        arg, query
                    )));
                }
            }
        }
        if uses == 0 {
            return Err(LogicError::InvalidQuery(format!("'{}' uses no declared predicate", query)));
        }
        Ok(())
    }
}

/// A query proposed by the model: a predicate applied to constants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryIdea {
    pub predicate_name: String,
    #[serde(default)]
    pub constants: Vec<String>,
}

impl QueryIdea {
    /// Assemble `P(a, b)` once the idea checks out against `decl`
    pub fn to_query(&self, decl: &Declarations) -> Result<String, LogicError> {
        let Some(&arity) = decl.predicates.get(&self.predicate_name) else {
            return Err(LogicError::InvalidQuery(format!(
                "unknown predicate '{}'",
                self.predicate_name
            )));
        };
        let unknown: Vec<&str> = self
            .constants
            .iter()
            .filter(|c| !decl.constants.contains(*c))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(LogicError::InvalidQuery(format!(
                "unknown constants for '{}': {}",
                self.predicate_name,
                unknown.join(", ")
            )));
        }
        if arity != self.constants.len() {
            return Err(LogicError::InvalidQuery(format!(
                "'{}' expects {} arguments, got {}",
                self.predicate_name,
                arity,
                self.constants.len()
            )));
        }
        if arity == 0 {
            return Ok(self.predicate_name.clone());
        }
        Ok(format!("{}({})", self.predicate_name, self.constants.join(", ")))
    }
}

/// Propositional belief set: declared atoms and formulas over them.
///
/// Connectives follow Tweety: `!`, `&&`, `||`, `=>`, `<=>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropositionalBeliefSet {
    #[serde(default)]
    pub propositions: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
}

impl PropositionalBeliefSet {
    pub fn validate(&self) -> Result<(), LogicError> {
        if self.formulas.is_empty() {
            return Err(LogicError::InvalidBeliefSet("no formulas given".to_string()));
        }
        if let Some(bad) = self.propositions.iter().find(|p| !IDENTIFIER.is_match(p)) {
            return Err(LogicError::InvalidBeliefSet(format!(
                "proposition '{}' is not a lowercase identifier",
                bad
            )));
        }
        let declared: BTreeSet<&str> = self.propositions.iter().map(String::as_str).collect();
        for formula in &self.formulas {
            Self::check_formula(formula, &declared).map_err(LogicError::InvalidBeliefSet)?;
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        self.formulas
            .iter()
            .map(|f| f.trim().trim_end_matches(';'))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Atoms used anywhere in rendered content
    pub fn atoms_in(content: &str) -> BTreeSet<&str> {
        PL_TOKEN
            .find_iter(content)
            .map(|m| m.as_str())
            .filter(|t| IDENTIFIER.is_match(t))
            .collect()
    }

    /// A query may only mention atoms the belief set already uses
    pub fn check_query(content: &str, query: &str) -> Result<(), LogicError> {
        let atoms = Self::atoms_in(content);
        Self::check_formula(query, &atoms).map_err(LogicError::InvalidQuery)
    }

    fn check_formula(formula: &str, declared: &BTreeSet<&str>) -> Result<(), String> {
        let formula = formula.trim().trim_end_matches(';');
        if formula.is_empty() {
            return Err("empty formula".to_string());
        }
        let mut depth: i32 = 0;
        for token in PL_TOKEN.find_iter(formula).map(|m| m.as_str()) {
            match token {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("unbalanced parentheses in '{}'", formula));
                    }
                }
                "!" | "&&" | "||" | "=>" | "<=>" => {}
                t if IDENTIFIER.is_match(t) => {
                    if !declared.contains(t) {
                        return Err(format!("undeclared proposition '{}' in '{}'", t, formula));
                    }
                }
                t => return Err(format!("unexpected token '{}' in '{}'", t, formula)),
            }
        }
        if depth != 0 {
            return Err(format!("unbalanced parentheses in '{}'", formula));
        }
        Ok(())
    }
}
