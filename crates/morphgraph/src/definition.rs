// Declarative model format and the loader that builds a linked grammar from it.
//
// A model document is JSON with five sections, each resolved in order:
// writing systems, named constraints, allomorph rule sets, stem lists and
// models. Later sections refer to earlier ones by name; constraints may also
// refer forward, which the loader turns into pointer constraints for the
// linker to resolve.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use morphgraph_core::{
    Form, MorphemeLabel, MorphemeSequence, NodeId, Normalizer, Tag, TextDirection, WritingSystem,
};
use morphgraph_engine::constraint::{IgnoreFlag, NodeScope, NodeTarget, PhonologyScope, TagScope};
use morphgraph_engine::rules::{AllomorphCase, AllomorphResult, CreateAllomorphs, FormReplacement};
use morphgraph_engine::{
    Allomorph, AllomorphKind, Constraint, ConstraintIndex, ConstraintKind, Grammar, GrammarBuilder,
    GrammarError, LexicalStem, MemoryStemList, Mode, NodeIndex, Portmanteau, RuleIndex, StemId,
    StemStore, compile_regex,
};

use crate::MorphologyError;

/// A complete model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Declared writing systems. The first one is the default for forms that
    /// do not name one.
    pub writing_systems: Vec<WritingSystemDef>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
    #[serde(default)]
    pub allomorph_rules: Vec<RuleSetDef>,
    #[serde(default)]
    pub stem_lists: Vec<StemListDef>,
    pub models: Vec<ModelDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritingSystemDef {
    pub abbreviation: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub font_family: String,
    #[serde(default)]
    pub right_to_left: bool,
    #[serde(default)]
    pub keyboard: Option<String>,
    #[serde(default)]
    pub normalization: NormalizationDef,
}

/// Input normalization for one writing system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizationDef {
    #[default]
    Identity,
    Lowercase,
    /// `[pattern, replacement]` pairs applied in order.
    Replacements { pairs: Vec<(String, String)> },
    Chain { steps: Vec<NormalizationDef> },
}

/// A constraint, optionally named so others can refer to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ignore: Vec<IgnoreDef>,
    #[serde(flatten)]
    pub kind: ConstraintKindDef,
}

/// Either the name of a constraint declared elsewhere or an inline one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintRef {
    Named(String),
    Inline(Box<ConstraintDef>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKindDef {
    Satisfied,
    TagMatch {
        tags: Vec<String>,
        scope: TagScopeDef,
        #[serde(default)]
        interrupted_by: Vec<String>,
    },
    Phonological {
        pattern: String,
        scope: PhonologyScopeDef,
    },
    PrecedingNode {
        target: NodeTargetDef,
        #[serde(default)]
        scope: NodeScopeDef,
    },
    FollowingNode {
        target: NodeTargetDef,
        #[serde(default)]
        scope: NodeScopeDef,
    },
    BoundMorpheme,
    WordFinal,
    And { constraints: Vec<ConstraintRef> },
    Or { constraints: Vec<ConstraintRef> },
    Not { constraint: Box<ConstraintRef> },
    Pointer { target: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagScopeDef {
    Current,
    ImmediatelyPreceding,
    AnyPreceding,
    ImmediatelyFollowing,
    AnyFollowing,
}

impl From<TagScopeDef> for TagScope {
    fn from(scope: TagScopeDef) -> Self {
        match scope {
            TagScopeDef::Current => TagScope::Current,
            TagScopeDef::ImmediatelyPreceding => TagScope::ImmediatelyPreceding,
            TagScopeDef::AnyPreceding => TagScope::AnyPreceding,
            TagScopeDef::ImmediatelyFollowing => TagScope::ImmediatelyFollowing,
            TagScopeDef::AnyFollowing => TagScope::AnyFollowing,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonologyScopeDef {
    Preceding,
    Current,
    Following,
}

impl From<PhonologyScopeDef> for PhonologyScope {
    fn from(scope: PhonologyScopeDef) -> Self {
        match scope {
            PhonologyScopeDef::Preceding => PhonologyScope::Preceding,
            PhonologyScopeDef::Current => PhonologyScope::Current,
            PhonologyScopeDef::Following => PhonologyScope::Following,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeScopeDef {
    #[default]
    Immediate,
    Any,
}

impl From<NodeScopeDef> for NodeScope {
    fn from(scope: NodeScopeDef) -> Self {
        match scope {
            NodeScopeDef::Immediate => NodeScope::Immediate,
            NodeScopeDef::Any => NodeScope::Any,
        }
    }
}

/// `{"id": "..."}` or `{"label": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTargetDef {
    Id(String),
    Label(String),
}

impl From<&NodeTargetDef> for NodeTarget {
    fn from(target: &NodeTargetDef) -> Self {
        match target {
            NodeTargetDef::Id(id) => NodeTarget::Id(NodeId::new(id)),
            NodeTargetDef::Label(label) => NodeTarget::Label(MorphemeLabel::new(label)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeDef {
    Parsing,
    Generation,
}

impl From<ModeDef> for Mode {
    fn from(mode: ModeDef) -> Self {
        match mode {
            ModeDef::Parsing => Mode::Parsing,
            ModeDef::Generation => Mode::Generation,
        }
    }
}

/// Makes a constraint inert in a writing system, a mode, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreDef {
    #[serde(default)]
    pub writing_system: Option<String>,
    #[serde(default)]
    pub mode: Option<ModeDef>,
}

/// An allomorph: a bare string in the default writing system, or a full
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllomorphDef {
    Text(String),
    Full(AllomorphSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllomorphSpec {
    /// Form in the default writing system.
    #[serde(default)]
    pub form: Option<String>,
    /// Forms keyed by writing-system abbreviation.
    #[serde(default)]
    pub forms: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<ConstraintRef>,
    /// Label run this allomorph realizes on its own, e.g. `"[go][PAST]"`.
    #[serde(default)]
    pub portmanteau: Option<MorphemeSequence>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default = "default_true")]
    pub use_in_generations: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDef {
    pub name: String,
    pub cases: Vec<CaseDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDef {
    #[serde(default)]
    pub conditions: Vec<ConstraintRef>,
    /// Writing system the conditions read; defaults to the source's first form.
    #[serde(default)]
    pub writing_system: Option<String>,
    pub results: Vec<ResultDef>,
    #[serde(default)]
    pub keep_original: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultDef {
    #[serde(default)]
    pub replacements: Vec<ReplacementDef>,
    #[serde(default)]
    pub add_tags: Vec<String>,
    #[serde(default)]
    pub remove_tags: Vec<String>,
    #[serde(default)]
    pub add_constraints: Vec<ConstraintRef>,
    #[serde(default)]
    pub use_in_generations: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementDef {
    #[serde(default)]
    pub writing_system: Option<String>,
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StemListDef {
    pub name: String,
    /// Tags a stem must carry to be inserted by `Morphology::insert_stem`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Rule set names applied to every stem.
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub stems: Vec<StemDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StemDef {
    #[serde(default)]
    pub id: Option<i64>,
    /// Shorthand for a single allomorph in the default writing system.
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub allomorphs: Vec<AllomorphDef>,
    /// Added to every allomorph of the stem.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub glosses: BTreeMap<String, String>,
    #[serde(default)]
    pub lift_guid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub nodes: Vec<NodeDef>,
}

/// A graph node. Nodes without an id get one derived from their model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub glosses: BTreeMap<String, String>,
    #[serde(flatten)]
    pub kind: NodeKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindDef {
    Morpheme {
        label: String,
        allomorphs: Vec<AllomorphDef>,
        #[serde(default)]
        rules: Vec<String>,
    },
    StemList {
        label: String,
        list: String,
    },
    Fork {
        paths: Vec<Vec<NodeDef>>,
    },
    Path {
        nodes: Vec<NodeDef>,
    },
    Sequence {
        nodes: Vec<NodeDef>,
    },
    Jump {
        target: String,
        #[serde(default)]
        target_required: bool,
    },
    MutuallyExclusive {
        #[serde(default)]
        label: Option<String>,
        morphemes: Vec<NodeDef>,
    },
    Copy {
        source: String,
        suffix: String,
    },
}

impl ModelDefinition {
    pub fn from_json(text: &str) -> Result<Self, MorphologyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MorphologyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MorphologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = text.len(), "read model definition");
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, MorphologyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build and link the grammar. Any failure aborts the whole load.
    pub(crate) fn build(&self) -> Result<LoadedModel, MorphologyError> {
        Loader::new(self).load()
    }
}

/// What a successful load hands to the facade.
pub(crate) struct LoadedModel {
    pub grammar: Grammar,
    pub writing_systems: Vec<WritingSystem>,
    pub normalizers: HashMap<WritingSystem, Normalizer>,
}

struct Loader<'d> {
    def: &'d ModelDefinition,
    builder: GrammarBuilder,
    writing_systems: Vec<WritingSystem>,
    by_abbreviation: HashMap<String, WritingSystem>,
    normalizers: HashMap<WritingSystem, Normalizer>,
    anonymous: usize,
}

impl<'d> Loader<'d> {
    fn new(def: &'d ModelDefinition) -> Self {
        Self {
            def,
            builder: GrammarBuilder::new(),
            writing_systems: Vec::new(),
            by_abbreviation: HashMap::new(),
            normalizers: HashMap::new(),
            anonymous: 0,
        }
    }

    fn load(mut self) -> Result<LoadedModel, MorphologyError> {
        let def = self.def;
        for ws in &def.writing_systems {
            self.writing_system(ws)?;
        }
        if self.writing_systems.is_empty() {
            return Err(MorphologyError::NoWritingSystem);
        }
        for c in &def.constraints {
            self.constraint(c)?;
        }
        for r in &def.allomorph_rules {
            let rule = self.rule_set(r)?;
            self.builder.add_rule_set(rule)?;
        }
        for l in &def.stem_lists {
            let list = self.stem_list(l)?;
            self.builder.add_stem_list(Box::new(list));
        }
        for m in &def.models {
            let children = self.nodes(&m.id, &m.nodes)?;
            self.builder.model(&m.id, children);
        }

        let grammar = self.builder.finish()?;
        info!(
            models = grammar.models().len(),
            nodes = grammar.node_count(),
            stem_lists = grammar.stem_lists().count(),
            "model loaded"
        );
        Ok(LoadedModel {
            grammar,
            writing_systems: self.writing_systems,
            normalizers: self.normalizers,
        })
    }

    fn writing_system(&mut self, def: &WritingSystemDef) -> Result<(), MorphologyError> {
        if self.by_abbreviation.contains_key(&def.abbreviation) {
            warn!(abbreviation = %def.abbreviation, "writing system declared twice; keeping the first");
            return Ok(());
        }
        let direction = if def.right_to_left {
            TextDirection::RightToLeft
        } else {
            TextDirection::LeftToRight
        };
        let mut ws = WritingSystem::with_metadata(
            def.abbreviation.as_str(),
            def.name.as_deref().unwrap_or(&def.abbreviation),
            def.font_family.as_str(),
            direction,
        );
        if let Some(keyboard) = &def.keyboard {
            ws = ws.with_keyboard(keyboard.as_str());
        }
        let normalizer = normalizer(&def.normalization)?;
        self.normalizers.insert(ws.clone(), normalizer);
        self.by_abbreviation.insert(def.abbreviation.clone(), ws.clone());
        self.writing_systems.push(ws);
        Ok(())
    }

    /// Look up a writing system by abbreviation, or the default one.
    fn ws(&self, abbreviation: Option<&str>) -> Result<WritingSystem, MorphologyError> {
        match abbreviation {
            Some(a) => self
                .by_abbreviation
                .get(a)
                .cloned()
                .ok_or_else(|| MorphologyError::UnknownWritingSystem(a.to_string())),
            None => self
                .writing_systems
                .first()
                .cloned()
                .ok_or(MorphologyError::NoWritingSystem),
        }
    }

    fn constraint(&mut self, def: &ConstraintDef) -> Result<ConstraintIndex, MorphologyError> {
        let kind = self.constraint_kind(&def.kind)?;
        let mut constraint = match &def.name {
            Some(name) => Constraint::named(name.as_str(), kind),
            None => Constraint::new(kind),
        };
        for flag in &def.ignore {
            let writing_system = match &flag.writing_system {
                Some(a) => Some(self.ws(Some(a))?),
                None => None,
            };
            constraint = constraint.with_ignore(IgnoreFlag {
                writing_system,
                mode: flag.mode.map(Mode::from),
            });
        }
        Ok(self.builder.add_constraint(constraint)?)
    }

    /// Named references to constraints not yet declared become pointers.
    fn constraint_ref(&mut self, r: &ConstraintRef) -> Result<ConstraintIndex, MorphologyError> {
        match r {
            ConstraintRef::Named(name) => Ok(match self.builder.constraint_by_name(name) {
                Some(index) => index,
                None => self.builder.constraint(Constraint::new(ConstraintKind::Pointer {
                    target_name: name.clone(),
                    target: None,
                })),
            }),
            ConstraintRef::Inline(def) => self.constraint(def),
        }
    }

    fn constraint_refs(&mut self, refs: &[ConstraintRef]) -> Result<Vec<ConstraintIndex>, MorphologyError> {
        refs.iter().map(|r| self.constraint_ref(r)).collect()
    }

    fn constraint_kind(&mut self, def: &ConstraintKindDef) -> Result<ConstraintKind, MorphologyError> {
        Ok(match def {
            ConstraintKindDef::Satisfied => ConstraintKind::Satisfied,
            ConstraintKindDef::TagMatch {
                tags,
                scope,
                interrupted_by,
            } => ConstraintKind::TagMatch {
                tags: tag_set(tags),
                scope: (*scope).into(),
                interrupted_by: tag_set(interrupted_by),
            },
            ConstraintKindDef::Phonological { pattern, scope } => ConstraintKind::Phonological {
                pattern: compile_regex(pattern)?,
                scope: (*scope).into(),
            },
            ConstraintKindDef::PrecedingNode { target, scope } => ConstraintKind::PrecedingNode {
                target: target.into(),
                scope: (*scope).into(),
            },
            ConstraintKindDef::FollowingNode { target, scope } => ConstraintKind::FollowingNode {
                target: target.into(),
                scope: (*scope).into(),
            },
            ConstraintKindDef::BoundMorpheme => ConstraintKind::BoundMorpheme,
            ConstraintKindDef::WordFinal => ConstraintKind::WordFinal,
            ConstraintKindDef::And { constraints } => {
                ConstraintKind::And(self.constraint_refs(constraints)?)
            }
            ConstraintKindDef::Or { constraints } => {
                ConstraintKind::Or(self.constraint_refs(constraints)?)
            }
            ConstraintKindDef::Not { constraint } => {
                ConstraintKind::Not(self.constraint_ref(constraint)?)
            }
            ConstraintKindDef::Pointer { target } => ConstraintKind::Pointer {
                target_name: target.clone(),
                target: None,
            },
        })
    }

    fn rule_set(&mut self, def: &RuleSetDef) -> Result<CreateAllomorphs, MorphologyError> {
        let mut cases = Vec::with_capacity(def.cases.len());
        for case in &def.cases {
            let conditions = self.constraint_refs(&case.conditions)?;
            let condition_writing_system = match &case.writing_system {
                Some(a) => Some(self.ws(Some(a))?),
                None => None,
            };
            let mut results = Vec::with_capacity(case.results.len());
            for r in &case.results {
                let mut replacements = Vec::with_capacity(r.replacements.len());
                for rep in &r.replacements {
                    replacements.push(FormReplacement {
                        writing_system: self.ws(rep.writing_system.as_deref())?,
                        pattern: compile_regex(&rep.pattern)?,
                        replacement: rep.replacement.clone(),
                    });
                }
                results.push(AllomorphResult {
                    replacements,
                    add_tags: tag_set(&r.add_tags),
                    remove_tags: tag_set(&r.remove_tags),
                    add_constraints: self.constraint_refs(&r.add_constraints)?,
                    use_in_generations: r.use_in_generations,
                });
            }
            cases.push(AllomorphCase {
                conditions,
                condition_writing_system,
                results,
                keep_original: case.keep_original,
            });
        }
        Ok(CreateAllomorphs::new(def.name.as_str(), cases))
    }

    fn rule_refs(&self, names: &[String]) -> Result<Vec<RuleIndex>, MorphologyError> {
        names
            .iter()
            .map(|name| {
                self.builder
                    .rule_by_name(name)
                    .ok_or_else(|| MorphologyError::from(GrammarError::UnknownAllomorphRule(name.clone())))
            })
            .collect()
    }

    fn allomorph(&mut self, def: &AllomorphDef) -> Result<Allomorph, MorphologyError> {
        let spec = match def {
            AllomorphDef::Text(text) => {
                return Ok(Allomorph::from_form(Form::new(self.ws(None)?, text)));
            }
            AllomorphDef::Full(spec) => spec,
        };
        let mut allomorph = Allomorph::new(AllomorphKind::Original)
            .with_tags(spec.tags.iter().map(Tag::new))
            .with_use_in_generations(spec.use_in_generations);
        if let Some(text) = &spec.form {
            allomorph.set_form(Form::new(self.ws(None)?, text));
        }
        for (abbreviation, text) in &spec.forms {
            allomorph.set_form(Form::new(self.ws(Some(abbreviation))?, text));
        }
        for c in self.constraint_refs(&spec.constraints)? {
            allomorph = allomorph.with_constraint(c);
        }
        if let Some(sequence) = &spec.portmanteau {
            allomorph = allomorph.with_portmanteau(Portmanteau::new(sequence.clone()));
        }
        if let Some(id) = spec.id {
            allomorph = allomorph.with_id(id);
        }
        Ok(allomorph)
    }

    fn stem_list(&mut self, def: &StemListDef) -> Result<MemoryStemList, MorphologyError> {
        let rules = self.rule_refs(&def.rules)?;
        let mut list = MemoryStemList::new(def.name.as_str())
            .with_tags(def.tags.iter().map(Tag::new))
            .with_rules(rules)
            .read_only(def.read_only);
        let mut stems = Vec::with_capacity(def.stems.len());
        for s in &def.stems {
            stems.push(self.stem(s)?);
        }
        list.read_stems(stems)?;
        debug!(list = %def.name, stems = list.len(), "stem list read");
        Ok(list)
    }

    fn stem(&mut self, def: &StemDef) -> Result<LexicalStem, MorphologyError> {
        let tags: Vec<Tag> = def.tags.iter().map(Tag::new).collect();
        let mut stem = LexicalStem::new();
        if let Some(text) = &def.form {
            let allomorph = Allomorph::from_form(Form::new(self.ws(None)?, text));
            stem.add_allomorph(allomorph.with_tags(tags.iter().cloned()));
        }
        for a in &def.allomorphs {
            let allomorph = self.allomorph(a)?;
            if !stem.add_allomorph(allomorph.with_tags(tags.iter().cloned())) {
                warn!(stem = ?def.form, "duplicate stem allomorph ignored");
            }
        }
        for (abbreviation, text) in &def.glosses {
            stem.set_gloss(Form::new(self.ws(Some(abbreviation))?, text));
        }
        if let Some(id) = def.id {
            stem = stem.with_id(StemId(id));
        }
        if let Some(guid) = &def.lift_guid {
            stem = stem.with_lift_guid(guid.as_str());
        }
        Ok(stem)
    }

    fn nodes(&mut self, model: &str, defs: &[NodeDef]) -> Result<Vec<NodeIndex>, MorphologyError> {
        defs.iter().map(|d| self.node(model, d)).collect()
    }

    fn node(&mut self, model: &str, def: &NodeDef) -> Result<NodeIndex, MorphologyError> {
        let id = match &def.id {
            Some(id) => id.clone(),
            None => {
                self.anonymous += 1;
                format!("{model}#{}", self.anonymous)
            }
        };
        let index = match &def.kind {
            NodeKindDef::Morpheme {
                label,
                allomorphs,
                rules,
            } => {
                let allomorphs = allomorphs
                    .iter()
                    .map(|a| self.allomorph(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let rules = self.rule_refs(rules)?;
                let index = self.builder.morpheme(&id, label, allomorphs);
                self.builder.set_rules(index, rules);
                index
            }
            NodeKindDef::StemList { label, list } => {
                let list = self
                    .builder
                    .stem_list_by_name(list)
                    .ok_or_else(|| GrammarError::UnknownStemList(list.clone()))?;
                self.builder.stem_list(&id, label, list)
            }
            NodeKindDef::Fork { paths } => {
                let mut alternatives = Vec::with_capacity(paths.len());
                for (i, path) in paths.iter().enumerate() {
                    let children = self.nodes(model, path)?;
                    alternatives.push(self.builder.path(&format!("{id}/{i}"), children));
                }
                self.builder.fork(&id, alternatives)
            }
            NodeKindDef::Path { nodes } => {
                let children = self.nodes(model, nodes)?;
                self.builder.path(&id, children)
            }
            NodeKindDef::Sequence { nodes } => {
                let children = self.nodes(model, nodes)?;
                self.builder.sequence(&id, children)
            }
            NodeKindDef::Jump {
                target,
                target_required,
            } => self.builder.jump(&id, target, *target_required),
            NodeKindDef::MutuallyExclusive { label, morphemes } => {
                let members = self.nodes(model, morphemes)?;
                let label = label.as_deref().unwrap_or(&id);
                self.builder.mutually_exclusive(&id, label, members)
            }
            NodeKindDef::Copy { source, suffix } => self.builder.copy(&id, source, suffix),
        };
        if def.optional {
            if matches!(def.kind, NodeKindDef::Sequence { .. }) {
                warn!(node = %id, "sequences are spliced in place and cannot be optional; flag ignored");
            }
            self.builder.set_optional(index, true);
        }
        for (abbreviation, text) in &def.glosses {
            let gloss = Form::new(self.ws(Some(abbreviation))?, text);
            self.builder.set_gloss(index, gloss);
        }
        Ok(index)
    }
}

fn tag_set(tags: &[String]) -> BTreeSet<Tag> {
    tags.iter().map(Tag::new).collect()
}

fn normalizer(def: &NormalizationDef) -> Result<Normalizer, MorphologyError> {
    Ok(match def {
        NormalizationDef::Identity => Normalizer::Identity,
        NormalizationDef::Lowercase => Normalizer::Lowercase,
        NormalizationDef::Replacements { pairs } => {
            Normalizer::replacements(pairs.iter().map(|(p, r)| (p.as_str(), r.as_str())))?
        }
        NormalizationDef::Chain { steps } => {
            Normalizer::Chain(steps.iter().map(normalizer).collect::<Result<_, _>>()?)
        }
    })
}
