// Lexical stems and stem storage.
//
// Stem stores are consumed through the `StemStore` trait so the traversal
// never depends on how stems are persisted. `MemoryStemList` is the in-memory
// implementation used for stems loaded from a model definition.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashMap;
use morphgraph_core::{Form, Tag, WritingSystem};

use crate::GrammarError;
use crate::allomorph::{Allomorph, AllomorphKind};
use crate::grammar::Grammar;
use crate::index::RuleIndex;
use crate::rules;

/// Identifier of a dictionary entry within its stem store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StemId(pub i64);

impl fmt::Display for StemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dictionary entry: a set of allomorphs sharing one lexical identity.
///
/// Two stems with ids are equal when their ids are; stems without an id
/// (hypothetical stems) compare by their allomorphs.
#[derive(Clone)]
pub struct LexicalStem {
    id: Option<StemId>,
    allomorphs: Vec<Arc<Allomorph>>,
    glosses: BTreeMap<WritingSystem, Form>,
    lift_guid: Option<String>,
    display: Option<Arc<Allomorph>>,
}

impl LexicalStem {
    pub fn new() -> Self {
        Self {
            id: None,
            allomorphs: Vec::new(),
            glosses: BTreeMap::new(),
            lift_guid: None,
            display: None,
        }
    }

    /// A stem with a single original allomorph.
    pub fn from_form(form: Form) -> Self {
        let mut stem = Self::new();
        stem.add_allomorph(Allomorph::from_form(form));
        stem
    }

    /// A guessed stem covering `form`, used in stem-suggestion mode.
    pub fn hypothetical(form: Form) -> Self {
        let mut stem = Self::new();
        stem.add_allomorph(Allomorph::new(AllomorphKind::Hypothetical).with_form(form));
        stem
    }

    pub fn with_id(mut self, id: StemId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_gloss(mut self, gloss: Form) -> Self {
        self.set_gloss(gloss);
        self
    }

    pub fn with_allomorph(mut self, allomorph: Allomorph) -> Self {
        self.add_allomorph(allomorph);
        self
    }

    pub fn with_lift_guid(mut self, guid: impl Into<String>) -> Self {
        self.lift_guid = Some(guid.into());
        self
    }

    pub fn id(&self) -> Option<StemId> {
        self.id
    }

    pub fn set_id(&mut self, id: StemId) {
        self.id = Some(id);
    }

    pub fn lift_guid(&self) -> Option<&str> {
        self.lift_guid.as_deref()
    }

    /// Add an allomorph unless an equal one is already present.
    ///
    /// Returns `false` for duplicates. The first `Original` allomorph becomes
    /// the display allomorph.
    pub fn add_allomorph(&mut self, allomorph: Allomorph) -> bool {
        if self.allomorphs.iter().any(|a| **a == allomorph) {
            return false;
        }
        let allomorph = Arc::new(allomorph);
        if self.display.is_none() && allomorph.kind() == AllomorphKind::Original {
            self.display = Some(Arc::clone(&allomorph));
        }
        self.allomorphs.push(allomorph);
        true
    }

    pub fn allomorphs(&self) -> &[Arc<Allomorph>] {
        &self.allomorphs
    }

    /// The canonical allomorph shown for this stem.
    ///
    /// Falls back to the first allomorph for stems without an original one.
    pub fn display_allomorph(&self) -> Option<&Arc<Allomorph>> {
        self.display.as_ref().or_else(|| self.allomorphs.first())
    }

    /// Display text in `ws`.
    pub fn display_text(&self, ws: &WritingSystem) -> Option<&str> {
        self.display_allomorph().and_then(|a| a.text(ws))
    }

    pub fn gloss(&self, ws: &WritingSystem) -> Option<&Form> {
        self.glosses.get(ws)
    }

    pub fn glosses(&self) -> impl Iterator<Item = &Form> {
        self.glosses.values()
    }

    pub fn set_gloss(&mut self, gloss: Form) {
        self.glosses.insert(gloss.writing_system().clone(), gloss);
    }

    pub fn is_hypothetical(&self) -> bool {
        self.allomorphs
            .iter()
            .all(|a| a.kind() == AllomorphKind::Hypothetical)
            && !self.allomorphs.is_empty()
    }

    /// Whether any allomorph carries every tag in `tags`.
    pub fn has_tags(&self, tags: &BTreeSet<Tag>) -> bool {
        tags.is_empty() || self.allomorphs.iter().any(|a| a.has_tags(tags))
    }

    /// Whether any allomorph has `form` among its forms.
    pub fn has_form(&self, form: &Form) -> bool {
        self.allomorphs
            .iter()
            .any(|a| a.form(form.writing_system()) == Some(form))
    }

    /// Replace the working allomorph set with the output of the given rule
    /// sets. Every original allomorph survives unless some rule fires on it.
    pub fn generate_allomorphs(&mut self, grammar: &Grammar, rule_sets: &[RuleIndex]) {
        if rule_sets.is_empty() {
            return;
        }
        let sources: Vec<Arc<Allomorph>> = std::mem::take(&mut self.allomorphs);
        let display = self.display.take();
        for source in &sources {
            for derived in rules::apply_rule_sets(grammar, rule_sets, source) {
                self.add_allomorph(derived);
            }
        }
        if self.allomorphs.is_empty() {
            self.allomorphs = sources;
        }
        if self.display.is_none() {
            self.display = display;
        }
    }

    /// `display-text (gloss)` for diagnostics.
    pub fn summary(&self) -> String {
        let text = self
            .display_allomorph()
            .and_then(|a| a.forms().next())
            .map(|f| f.text().to_string())
            .unwrap_or_default();
        match self.glosses.values().next() {
            Some(g) => format!("{text} ({})", g.text()),
            None => text,
        }
    }
}

impl Default for LexicalStem {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for LexicalStem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && (self.id.is_some() || self.allomorphs == other.allomorphs)
    }
}

impl Eq for LexicalStem {}

impl Hash for LexicalStem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        if self.id.is_none() {
            for a in &self.allomorphs {
                a.hash(state);
            }
        }
    }
}

impl fmt::Debug for LexicalStem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexicalStem")
            .field("id", &self.id)
            .field("summary", &self.summary())
            .field("allomorphs", &self.allomorphs.len())
            .finish()
    }
}

/// Storage back end for lexical stems.
///
/// The traversal reads stems through [`matching_allomorphs`] and [`stems`];
/// the facade mutates them through the add/replace/remove operations.
///
/// [`matching_allomorphs`]: StemStore::matching_allomorphs
/// [`stems`]: StemStore::stems
pub trait StemStore: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Tags a stem must carry to be admitted by [`matches_for_insert`](Self::matches_for_insert).
    fn tags(&self) -> &BTreeSet<Tag>;

    /// Allomorph-generation rule sets applied to every stem of this store.
    fn rules(&self) -> &[RuleIndex];

    /// Whether the store refuses insertions.
    fn is_read_only(&self) -> bool {
        false
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stems(&self) -> Box<dyn Iterator<Item = &Arc<LexicalStem>> + '_>;

    fn stem(&self, id: StemId) -> Option<&Arc<LexicalStem>>;

    /// Bulk-load stems, assigning ids to those without one.
    fn read_stems(&mut self, stems: Vec<LexicalStem>) -> Result<Vec<StemId>, GrammarError> {
        stems.into_iter().map(|s| self.add_stem(s)).collect()
    }

    /// Insert a stem, assigning an id if it has none. Returns the id.
    fn add_stem(&mut self, stem: LexicalStem) -> Result<StemId, GrammarError>;

    fn replace_stem(&mut self, id: StemId, stem: LexicalStem) -> Result<(), GrammarError>;

    fn remove_stem(&mut self, id: StemId) -> Result<Arc<LexicalStem>, GrammarError>;

    /// Rewrite every stem in place (used by the linker to apply rules).
    fn update_stems(&mut self, f: &mut dyn FnMut(&mut LexicalStem));

    /// Stems with an allomorph whose form in the form's writing system is `form`.
    fn stems_from_form(&self, form: &Form) -> Vec<Arc<LexicalStem>> {
        self.stems().filter(|s| s.has_form(form)).cloned().collect()
    }

    /// Stems containing an allomorph equal to `allomorph`.
    fn stems_from_allomorph(&self, allomorph: &Allomorph) -> Vec<Arc<LexicalStem>> {
        self.stems()
            .filter(|s| s.allomorphs().iter().any(|a| **a == *allomorph))
            .cloned()
            .collect()
    }

    /// Tag-based admission test for new stems.
    fn matches_for_insert(&self, stem: &LexicalStem) -> bool {
        !self.is_read_only() && stem.has_tags(self.tags())
    }

    /// Every (stem, allomorph) whose text in `ws` is a prefix of `remainder`.
    fn matching_allomorphs(
        &self,
        ws: &WritingSystem,
        remainder: &str,
    ) -> Vec<(Arc<LexicalStem>, Arc<Allomorph>)> {
        let mut out = Vec::new();
        for stem in self.stems() {
            for a in stem.allomorphs() {
                if a.text(ws).is_some_and(|t| remainder.starts_with(t)) {
                    out.push((Arc::clone(stem), Arc::clone(a)));
                }
            }
        }
        out
    }
}

/// In-memory stem store with a first-character index per writing system.
#[derive(Debug)]
pub struct MemoryStemList {
    name: String,
    tags: BTreeSet<Tag>,
    rules: Vec<RuleIndex>,
    read_only: bool,
    stems: Vec<Arc<LexicalStem>>,
    by_id: HashMap<StemId, usize>,
    /// (writing system, first char) -> (stem position, allomorph position).
    index: HashMap<(WritingSystem, char), Vec<(usize, usize)>>,
    /// Allomorphs with an empty form, per writing system.
    empty: HashMap<WritingSystem, Vec<(usize, usize)>>,
    next_id: i64,
}

impl MemoryStemList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            rules: Vec::new(),
            read_only: false,
            stems: Vec::new(),
            by_id: HashMap::new(),
            index: HashMap::new(),
            empty: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleIndex>) -> Self {
        self.rules = rules;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    fn rebuild_index(&mut self) {
        self.by_id.clear();
        self.index.clear();
        self.empty.clear();
        for (si, stem) in self.stems.iter().enumerate() {
            if let Some(id) = stem.id() {
                self.by_id.insert(id, si);
            }
            for (ai, a) in stem.allomorphs().iter().enumerate() {
                for form in a.forms() {
                    let ws = form.writing_system().clone();
                    match form.text().chars().next() {
                        Some(c) => self.index.entry((ws, c)).or_default().push((si, ai)),
                        None => self.empty.entry(ws).or_default().push((si, ai)),
                    }
                }
            }
        }
    }

    fn assign_id(&mut self, stem: &mut LexicalStem) -> StemId {
        match stem.id() {
            Some(id) => {
                self.next_id = self.next_id.max(id.0 + 1);
                id
            }
            None => {
                let id = StemId(self.next_id);
                self.next_id += 1;
                stem.set_id(id);
                id
            }
        }
    }
}

impl StemStore for MemoryStemList {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &BTreeSet<Tag> {
        &self.tags
    }

    fn rules(&self) -> &[RuleIndex] {
        &self.rules
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn len(&self) -> usize {
        self.stems.len()
    }

    fn stems(&self) -> Box<dyn Iterator<Item = &Arc<LexicalStem>> + '_> {
        Box::new(self.stems.iter())
    }

    fn stem(&self, id: StemId) -> Option<&Arc<LexicalStem>> {
        self.by_id.get(&id).map(|&i| &self.stems[i])
    }

    fn read_stems(&mut self, stems: Vec<LexicalStem>) -> Result<Vec<StemId>, GrammarError> {
        let mut ids = Vec::with_capacity(stems.len());
        for mut stem in stems {
            let id = self.assign_id(&mut stem);
            if self.by_id.insert(id, self.stems.len()).is_some() {
                tracing::warn!(list = %self.name, stem = %id, "duplicate stem id; later entry shadows earlier");
            }
            self.stems.push(Arc::new(stem));
            ids.push(id);
        }
        self.rebuild_index();
        Ok(ids)
    }

    fn add_stem(&mut self, mut stem: LexicalStem) -> Result<StemId, GrammarError> {
        if self.read_only {
            return Err(GrammarError::ReadOnlyStemList {
                list: self.name.clone(),
            });
        }
        let id = self.assign_id(&mut stem);
        match self.by_id.get(&id) {
            Some(&i) => self.stems[i] = Arc::new(stem),
            None => self.stems.push(Arc::new(stem)),
        }
        self.rebuild_index();
        Ok(id)
    }

    fn replace_stem(&mut self, id: StemId, mut stem: LexicalStem) -> Result<(), GrammarError> {
        if self.read_only {
            return Err(GrammarError::ReadOnlyStemList {
                list: self.name.clone(),
            });
        }
        let Some(&i) = self.by_id.get(&id) else {
            return Err(GrammarError::UnknownStem(id));
        };
        stem.set_id(id);
        self.stems[i] = Arc::new(stem);
        self.rebuild_index();
        Ok(())
    }

    fn remove_stem(&mut self, id: StemId) -> Result<Arc<LexicalStem>, GrammarError> {
        if self.read_only {
            return Err(GrammarError::ReadOnlyStemList {
                list: self.name.clone(),
            });
        }
        let Some(&i) = self.by_id.get(&id) else {
            return Err(GrammarError::UnknownStem(id));
        };
        let removed = self.stems.remove(i);
        self.rebuild_index();
        Ok(removed)
    }

    fn update_stems(&mut self, f: &mut dyn FnMut(&mut LexicalStem)) {
        for stem in &mut self.stems {
            f(Arc::make_mut(stem));
        }
        self.rebuild_index();
    }

    fn matching_allomorphs(
        &self,
        ws: &WritingSystem,
        remainder: &str,
    ) -> Vec<(Arc<LexicalStem>, Arc<Allomorph>)> {
        let mut out = Vec::new();
        let mut push = |&(si, ai): &(usize, usize)| {
            let stem = &self.stems[si];
            let a = &stem.allomorphs()[ai];
            if a.text(ws).is_some_and(|t| remainder.starts_with(t)) {
                out.push((Arc::clone(stem), Arc::clone(a)));
            }
        };
        if let Some(empty) = self.empty.get(ws) {
            empty.iter().for_each(&mut push);
        }
        if let Some(c) = remainder.chars().next() {
            if let Some(bucket) = self.index.get(&(ws.clone(), c)) {
                bucket.iter().for_each(&mut push);
            }
        }
        out
    }
}
