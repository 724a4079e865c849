// Morphology: the public facade over a loaded grammar.
//
// Owns the linked graph, the declared writing systems and their input
// normalizers. Parsing and generation are read-only and run every model in
// declaration order; stem editing goes through `&mut self` and re-derives the
// per-model zero-length flags afterwards.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use morphgraph_core::{Form, Normalizer, WritingSystem};
use morphgraph_engine::{
    Generation, Grammar, GrammarError, LexicalStem, MorphemeSequenceConstraint, Node, NodeIndex,
    NullLog, ParseFlags, Parsing, ParsingLog, StemId, StemIdentityConstraint, StemListIndex,
    Traversal, TraversalConfig,
};

use crate::MorphologyError;
use crate::definition::ModelDefinition;

/// A loaded morphological grammar and the operations over it.
pub struct Morphology {
    grammar: Grammar,

    /// Declared writing systems; the first is the default.
    writing_systems: Vec<WritingSystem>,

    /// Input normalization per writing system. Missing entries mean identity.
    normalizers: HashMap<WritingSystem, Normalizer>,

    /// Base configuration; per-call flags are merged into it.
    config: TraversalConfig,

    /// Traversal hooks. [`NullLog`] unless replaced with [`with_log`](Self::with_log).
    log: Arc<dyn ParsingLog>,
}

impl Morphology {
    /// Wrap an already linked grammar.
    pub fn new(grammar: Grammar, writing_systems: Vec<WritingSystem>) -> Self {
        Self {
            grammar,
            writing_systems,
            normalizers: HashMap::new(),
            config: TraversalConfig::default(),
            log: Arc::new(NullLog),
        }
    }

    pub fn from_definition(def: &ModelDefinition) -> Result<Self, MorphologyError> {
        let loaded = def.build()?;
        let mut morphology = Self::new(loaded.grammar, loaded.writing_systems);
        morphology.normalizers = loaded.normalizers;
        Ok(morphology)
    }

    pub fn from_json(text: &str) -> Result<Self, MorphologyError> {
        Self::from_definition(&ModelDefinition::from_json(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MorphologyError> {
        Self::from_definition(&ModelDefinition::from_path(path)?)
    }

    /// Install traversal hooks.
    pub fn with_log(mut self, log: Arc<dyn ParsingLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_config(mut self, config: TraversalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn set_normalizer(&mut self, ws: WritingSystem, normalizer: Normalizer) {
        self.normalizers.insert(ws, normalizer);
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    // -- Lookups --

    pub fn writing_systems(&self) -> &[WritingSystem] {
        &self.writing_systems
    }

    pub fn writing_system(&self, abbreviation: &str) -> Option<&WritingSystem> {
        self.writing_systems
            .iter()
            .find(|ws| ws.abbreviation() == abbreviation)
    }

    pub fn default_writing_system(&self) -> Option<&WritingSystem> {
        self.writing_systems.first()
    }

    /// Model ids in declaration order.
    pub fn model_names(&self) -> Vec<&str> {
        self.grammar
            .models()
            .iter()
            .map(|&m| self.grammar.node(m).id().as_str())
            .collect()
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.grammar.node_by_id(id).map(|i| self.grammar.node(i))
    }

    pub fn nodes_by_label(&self, label: &str) -> Vec<&Node> {
        self.grammar
            .nodes_by_label(label)
            .iter()
            .map(|&i| self.grammar.node(i))
            .collect()
    }

    /// Apply the writing system's normalizer to `form`.
    pub fn normalize(&self, form: &Form) -> Form {
        match self.normalizers.get(form.writing_system()) {
            Some(n) => n.normalize_form(form),
            None => form.clone(),
        }
    }

    // -- Parsing --

    /// Every completed parse of `form` across all models, in model order.
    ///
    /// Ambiguous results are all returned. An empty list means the grammar
    /// does not accept the input.
    pub fn possible_parsings(&self, form: &Form, flags: ParseFlags) -> Vec<Parsing> {
        let form = self.normalize(form);
        let config = self.config.with_flags(flags);
        let mut out = Vec::new();
        for traversal in self.traversals(config) {
            out.extend(traversal.parse(&form));
            if config.only_one_result && !out.is_empty() {
                out.truncate(1);
                break;
            }
        }
        debug!(input = form.text(), parses = out.len(), "parsed");
        out
    }

    /// [`possible_parsings`](Self::possible_parsings) with parses that share a
    /// label summary and stem sequence collapsed.
    pub fn unique_parsings(&self, form: &Form, flags: ParseFlags) -> Vec<Parsing> {
        let mut seen = HashSet::new();
        self.possible_parsings(form, flags)
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }

    /// Parse with stem guessing enabled: stem-list nodes may hypothesize an
    /// unknown stem from the input.
    pub fn guess_stem(&self, form: &Form) -> Vec<Parsing> {
        self.possible_parsings(form, ParseFlags::guessing())
    }

    // -- Generation --

    /// Generate surface forms for `morphemes` over `stems` in `ws`, either in
    /// the named model or in every model.
    pub fn generate_forms(
        &self,
        ws: &WritingSystem,
        stems: StemIdentityConstraint,
        morphemes: MorphemeSequenceConstraint,
        model: Option<&str>,
    ) -> Result<Vec<Generation>, MorphologyError> {
        let models: Vec<NodeIndex> = match model {
            Some(name) => vec![self
                .grammar
                .model_by_name(name)
                .ok_or_else(|| MorphologyError::UnknownModel(name.to_string()))?],
            None => self.grammar.models().to_vec(),
        };
        let mut out = Vec::new();
        for m in models {
            let traversal = Traversal::new(&self.grammar, m, self.config, self.log.as_ref())?;
            out.extend(traversal.generate(ws, stems.clone(), morphemes.clone()));
        }
        debug!(target_ws = %ws, results = out.len(), "generated");
        Ok(out)
    }

    /// Parse `form`, then regenerate each parse in `target` with the same
    /// stems and morpheme sequence. Results with identical output collapse.
    pub fn transduce_into(&self, form: &Form, target: &WritingSystem) -> Vec<Generation> {
        let parses = self.unique_parsings(form, ParseFlags::default());
        self.regenerate_all(&parses, target, |p| Some(p.stems()))
    }

    /// Parse `form`, then regenerate each parse in the input's writing system
    /// with its first stem replaced by `stem`. Parses without a stem are
    /// skipped.
    pub fn replace_stem_into(&self, form: &Form, stem: Arc<LexicalStem>) -> Vec<Generation> {
        let parses = self.unique_parsings(form, ParseFlags::default());
        self.regenerate_all(&parses, form.writing_system(), |p| {
            let mut stems = p.stems();
            *stems.first_mut()? = Arc::clone(&stem);
            Some(stems)
        })
    }

    /// The first surface form `form` transduces to in `target`.
    pub fn first_transduction(&self, form: &Form, target: &WritingSystem) -> Option<Form> {
        self.transduce_into(form, target)
            .first()
            .map(Generation::output)
    }

    fn regenerate_all(
        &self,
        parses: &[Parsing],
        target: &WritingSystem,
        stems_for: impl Fn(&Parsing) -> Option<Vec<Arc<LexicalStem>>>,
    ) -> Vec<Generation> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for parse in parses {
            let Some(stems) = stems_for(parse) else {
                continue;
            };
            let Some(model) = parse.model() else {
                continue;
            };
            let Ok(traversal) = Traversal::new(&self.grammar, model, self.config, self.log.as_ref())
            else {
                continue;
            };
            let generated = traversal.generate(
                target,
                StemIdentityConstraint::new(stems),
                MorphemeSequenceConstraint::new(&parse.morpheme_sequence()),
            );
            for g in generated {
                if seen.insert(g.output()) {
                    out.push(g);
                }
            }
        }
        out
    }

    fn traversals(&self, config: TraversalConfig) -> impl Iterator<Item = Traversal<'_>> + '_ {
        self.grammar
            .models()
            .iter()
            .filter_map(move |&m| Traversal::new(&self.grammar, m, config, self.log.as_ref()).ok())
    }

    // -- Stems --

    pub fn stem_list_names(&self) -> Vec<&str> {
        self.grammar.stem_lists().map(|(_, l)| l.name()).collect()
    }

    pub fn stem(&self, list: &str, id: StemId) -> Result<Arc<LexicalStem>, MorphologyError> {
        let index = self.list_index(list)?;
        self.grammar
            .stem_list(index)
            .stem(id)
            .cloned()
            .ok_or_else(|| GrammarError::UnknownStem(id).into())
    }

    /// Add a stem to `list`, deriving its allomorphs with the list's rules.
    pub fn add_stem(&mut self, list: &str, stem: LexicalStem) -> Result<StemId, MorphologyError> {
        let index = self.list_index(list)?;
        let stem = self.prepare(index, stem);
        let id = self.grammar.stem_list_mut(index).add_stem(stem)?;
        self.grammar.refresh_zero_length_forms();
        debug!(list, stem = %id, "stem added");
        Ok(id)
    }

    pub fn replace_stem(
        &mut self,
        list: &str,
        id: StemId,
        stem: LexicalStem,
    ) -> Result<(), MorphologyError> {
        let index = self.list_index(list)?;
        let stem = self.prepare(index, stem);
        self.grammar.stem_list_mut(index).replace_stem(id, stem)?;
        self.grammar.refresh_zero_length_forms();
        Ok(())
    }

    pub fn remove_stem(&mut self, list: &str, id: StemId) -> Result<Arc<LexicalStem>, MorphologyError> {
        let index = self.list_index(list)?;
        let removed = self.grammar.stem_list_mut(index).remove_stem(id)?;
        self.grammar.refresh_zero_length_forms();
        Ok(removed)
    }

    /// Add `stem` to the first writable list whose tag filter admits it.
    /// Returns the list name and the assigned id.
    pub fn insert_stem(&mut self, stem: LexicalStem) -> Result<(String, StemId), MorphologyError> {
        let target = self.grammar.stem_lists().find_map(|(index, list)| {
            if list.matches_for_insert(&stem) {
                return Some((index, list.name().to_string()));
            }
            if !list.is_read_only() {
                warn!(list = list.name(), stem = %stem.summary(), "stem rejected by tag filter");
            }
            None
        });
        let Some((index, name)) = target else {
            return Err(MorphologyError::StemRejected(stem.summary()));
        };
        let stem = self.prepare(index, stem);
        let id = self.grammar.stem_list_mut(index).add_stem(stem)?;
        self.grammar.refresh_zero_length_forms();
        Ok((name, id))
    }

    /// Stems in any list with an allomorph whose form is `form`.
    pub fn stems_from_form(&self, form: &Form) -> Vec<Arc<LexicalStem>> {
        self.grammar
            .stem_lists()
            .flat_map(|(_, l)| l.stems_from_form(form))
            .collect()
    }

    /// The one stem whose allomorph text or gloss is `text`.
    pub fn search_stem(&self, text: &str) -> Result<Arc<LexicalStem>, MorphologyError> {
        let mut found: Vec<Arc<LexicalStem>> = Vec::new();
        for (_, list) in self.grammar.stem_lists() {
            for stem in list.stems() {
                let hit = stem
                    .allomorphs()
                    .iter()
                    .any(|a| a.forms().any(|f| f.text() == text))
                    || stem.glosses().any(|g| g.text() == text);
                if hit && !found.iter().any(|s| Arc::ptr_eq(s, stem)) {
                    found.push(Arc::clone(stem));
                }
            }
        }
        match found.len() {
            0 => Err(MorphologyError::NoMatchingStem(text.to_string())),
            1 => Ok(found.remove(0)),
            count => Err(MorphologyError::AmbiguousStem {
                text: text.to_string(),
                count,
            }),
        }
    }

    fn list_index(&self, name: &str) -> Result<StemListIndex, MorphologyError> {
        self.grammar
            .stem_list_by_name(name)
            .ok_or_else(|| MorphologyError::UnknownStemList(name.to_string()))
    }

    fn prepare(&self, index: StemListIndex, mut stem: LexicalStem) -> LexicalStem {
        let rules = self.grammar.stem_list(index).rules().to_vec();
        stem.generate_allomorphs(&self.grammar, &rules);
        stem
    }
}

impl fmt::Debug for Morphology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Morphology")
            .field("models", &self.model_names())
            .field("writing_systems", &self.writing_systems)
            .field("nodes", &self.grammar.node_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphgraph_core::Tag;
    use morphgraph_engine::Allomorph;

    const MODEL: &str = r#"{
        "writing_systems": [
            { "abbreviation": "en", "normalization": { "type": "lowercase" } },
            { "abbreviation": "ipa" }
        ],
        "stem_lists": [
            { "name": "verbs", "tags": ["verb"], "stems": [
                { "id": 1, "allomorphs": [{ "forms": { "en": "katit", "ipa": "katɪt" } }],
                  "tags": ["verb"], "glosses": { "en": "cut" } },
                { "id": 2, "allomorphs": [{ "forms": { "en": "walk", "ipa": "wɔk" } }],
                  "tags": ["verb"], "glosses": { "en": "stroll" } }
            ] },
            { "name": "frozen", "read_only": true, "stems": [{ "form": "old" }] }
        ],
        "models": [{
            "id": "verb",
            "nodes": [
                { "type": "stem_list", "id": "stem", "label": "Stem", "list": "verbs" },
                { "type": "morpheme", "id": "ing", "label": "-ing", "optional": true,
                  "allomorphs": [{ "forms": { "en": "ing", "ipa": "ɪŋ" }, "tags": ["progressive"] }] }
            ]
        }]
    }"#;

    fn morphology() -> Morphology {
        Morphology::from_json(MODEL).unwrap()
    }

    fn en(m: &Morphology) -> WritingSystem {
        m.writing_system("en").cloned().unwrap()
    }

    #[test]
    fn lookups() {
        let m = morphology();
        assert_eq!(m.model_names(), vec!["verb"]);
        assert_eq!(m.default_writing_system().map(|w| w.abbreviation()), Some("en"));
        assert!(m.node_by_id("ing").is_some());
        assert_eq!(m.nodes_by_label("-ing").len(), 1);
        assert!(m.node_by_id("nope").is_none());
        assert_eq!(m.stem_list_names(), vec!["verbs", "frozen"]);
    }

    #[test]
    fn input_is_normalized_before_parsing() {
        let m = morphology();
        let parses = m.possible_parsings(&Form::new(en(&m), "KATITing"), ParseFlags::default());
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0].summary(), "[Stem][-ing]");
    }

    #[test]
    fn transduction_changes_script() {
        let m = morphology();
        let ipa = m.writing_system("ipa").cloned().unwrap();
        let out = m.first_transduction(&Form::new(en(&m), "katiting"), &ipa).unwrap();
        assert_eq!(out.text(), "katɪtɪŋ");
        assert_eq!(out.writing_system(), &ipa);
    }

    #[test]
    fn replace_stem_keeps_affixes() {
        let m = morphology();
        let walk = m.stem("verbs", StemId(2)).unwrap();
        let out = m.replace_stem_into(&Form::new(en(&m), "katiting"), walk);
        let texts: Vec<String> = out.iter().map(|g| g.output().text().to_string()).collect();
        assert_eq!(texts, vec!["walking"]);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let m = morphology();
        let err = m
            .generate_forms(
                &en(&m),
                StemIdentityConstraint::default(),
                MorphemeSequenceConstraint::default(),
                Some("noun"),
            )
            .unwrap_err();
        assert!(matches!(err, MorphologyError::UnknownModel(_)));
    }

    #[test]
    fn added_stems_are_parsable() {
        let mut m = morphology();
        let form = Form::new(en(&m), "jumping");
        assert!(m.possible_parsings(&form, ParseFlags::default()).is_empty());

        let id = m
            .add_stem("verbs", LexicalStem::from_form(Form::new(en(&m), "jump")))
            .unwrap();
        assert_eq!(id, StemId(3));
        assert_eq!(m.possible_parsings(&form, ParseFlags::default()).len(), 1);

        m.remove_stem("verbs", id).unwrap();
        assert!(m.possible_parsings(&form, ParseFlags::default()).is_empty());
    }

    #[test]
    fn replaced_stems_change_parses() {
        let mut m = morphology();
        m.replace_stem("verbs", StemId(2), LexicalStem::from_form(Form::new(en(&m), "run")))
            .unwrap();
        let runs = m.possible_parsings(&Form::new(en(&m), "running"), ParseFlags::default());
        assert!(runs.is_empty());
        let run = m.possible_parsings(&Form::new(en(&m), "runing"), ParseFlags::default());
        assert_eq!(run.len(), 1);
        assert!(m.possible_parsings(&Form::new(en(&m), "walk"), ParseFlags::default()).is_empty());
    }

    #[test]
    fn stem_editing_errors() {
        let mut m = morphology();
        let stem = LexicalStem::from_form(Form::new(en(&m), "x"));
        assert!(matches!(
            m.add_stem("nouns", stem.clone()).unwrap_err(),
            MorphologyError::UnknownStemList(_)
        ));
        assert!(matches!(
            m.add_stem("frozen", stem.clone()).unwrap_err(),
            MorphologyError::Grammar(GrammarError::ReadOnlyStemList { .. })
        ));
        assert!(matches!(
            m.remove_stem("verbs", StemId(99)).unwrap_err(),
            MorphologyError::Grammar(GrammarError::UnknownStem(_))
        ));
    }

    #[test]
    fn insert_stem_honors_tag_filters() {
        let mut m = morphology();
        let bare = LexicalStem::from_form(Form::new(en(&m), "sing"));
        assert!(matches!(
            m.insert_stem(bare).unwrap_err(),
            MorphologyError::StemRejected(_)
        ));

        let tagged = LexicalStem::new().with_allomorph(
            Allomorph::from_form(Form::new(en(&m), "sing")).with_tag(Tag::new("verb")),
        );
        let (list, id) = m.insert_stem(tagged).unwrap();
        assert_eq!(list, "verbs");
        let index = m.grammar().stem_list_by_name("verbs").unwrap();
        assert!(m.grammar().stem_list(index).stem(id).is_some());
    }

    #[test]
    fn search_stem_requires_exactly_one_match() {
        let m = morphology();
        assert_eq!(m.search_stem("cut").unwrap().id(), Some(StemId(1)));
        assert_eq!(m.search_stem("wɔk").unwrap().id(), Some(StemId(2)));
        assert!(matches!(
            m.search_stem("zzz").unwrap_err(),
            MorphologyError::NoMatchingStem(_)
        ));
    }

    #[test]
    fn search_stem_reports_ambiguity() {
        let mut m = morphology();
        m.add_stem(
            "verbs",
            LexicalStem::from_form(Form::new(en(&m), "chop")).with_gloss(Form::new(en(&m), "cut")),
        )
        .unwrap();
        assert!(matches!(
            m.search_stem("cut").unwrap_err(),
            MorphologyError::AmbiguousStem { count: 2, .. }
        ));
    }

    #[test]
    fn stems_from_form_searches_every_list() {
        let m = morphology();
        assert_eq!(m.stems_from_form(&Form::new(en(&m), "old")).len(), 1);
        assert_eq!(m.stems_from_form(&Form::new(en(&m), "katit")).len(), 1);
    }

    #[test]
    fn debug_output_names_models() {
        let m = morphology();
        assert!(format!("{m:?}").contains("verb"));
    }
}
