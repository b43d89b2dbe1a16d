//! Schema set compilation driven by an entity resolver
//!
//! [`GrammarCompiler`] loads an entry schema document and follows its
//! `xs:import`, `xs:include` and `xs:redefine` references, asking an
//! [`EntityResolver`] where each referenced document lives. Every global
//! component declared along the way is collected into [`SchemaGrammars`],
//! the symbol tables later grammar construction works from.
//!
//! Once all documents are loaded the compiler checks that the set hangs
//! together: resolved documents declare the namespace they were requested
//! for, no global component is declared twice, and every QName reference
//! lands on a declared component (the XSD and XML namespaces are built
//! in). A broken invariant surfaces as [`Error::Consistency`]; a
//! well-formed, self-consistent schema set never produces one.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::documents::{Document, Element};
use crate::error::{ConsistencyViolation, Error, ParseError, Result, ViolationKind};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::names::{validate_ncname, validate_qname};
use crate::namespaces::{QName, XML_NAMESPACE, XSD_NAMESPACE};
use crate::resolver::{EntityResolver, Resolution, ResolutionRequest};

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const ANNOTATION: &str = "annotation";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
}

/// Symbol spaces of global components; names are unique per space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolSpace {
    /// Element declarations
    Element,
    /// Attribute declarations
    Attribute,
    /// Simple and complex type definitions
    Type,
    /// Model group definitions
    Group,
    /// Attribute group definitions
    AttributeGroup,
    /// Notation declarations
    Notation,
}

/// Kind of a global schema component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    /// `xs:element`
    Element,
    /// `xs:attribute`
    Attribute,
    /// `xs:complexType`
    ComplexType,
    /// `xs:simpleType`
    SimpleType,
    /// `xs:group`
    Group,
    /// `xs:attributeGroup`
    AttributeGroup,
    /// `xs:notation`
    Notation,
}

impl ComponentKind {
    /// Component kind for a top-level XSD element name
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "element" => Some(ComponentKind::Element),
            "attribute" => Some(ComponentKind::Attribute),
            "complexType" => Some(ComponentKind::ComplexType),
            "simpleType" => Some(ComponentKind::SimpleType),
            "group" => Some(ComponentKind::Group),
            "attributeGroup" => Some(ComponentKind::AttributeGroup),
            "notation" => Some(ComponentKind::Notation),
            _ => None,
        }
    }

    /// Symbol space the component is named in
    pub fn symbol_space(self) -> SymbolSpace {
        match self {
            ComponentKind::Element => SymbolSpace::Element,
            ComponentKind::Attribute => SymbolSpace::Attribute,
            ComponentKind::ComplexType | ComponentKind::SimpleType => SymbolSpace::Type,
            ComponentKind::Group => SymbolSpace::Group,
            ComponentKind::AttributeGroup => SymbolSpace::AttributeGroup,
            ComponentKind::Notation => SymbolSpace::Notation,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Element => "element",
            ComponentKind::Attribute => "attribute",
            ComponentKind::ComplexType => "complexType",
            ComponentKind::SimpleType => "simpleType",
            ComponentKind::Group => "group",
            ComponentKind::AttributeGroup => "attributeGroup",
            ComponentKind::Notation => "notation",
        };
        f.write_str(s)
    }
}

/// QName-valued attributes that reference global components:
/// (owner element, attribute, referenced symbol space)
const REFERENCE_ATTRIBUTES: &[(&str, &str, SymbolSpace)] = &[
    ("element", "type", SymbolSpace::Type),
    ("element", "ref", SymbolSpace::Element),
    ("element", "substitutionGroup", SymbolSpace::Element),
    ("attribute", "type", SymbolSpace::Type),
    ("attribute", "ref", SymbolSpace::Attribute),
    ("restriction", "base", SymbolSpace::Type),
    ("extension", "base", SymbolSpace::Type),
    ("list", "itemType", SymbolSpace::Type),
    ("union", "memberTypes", SymbolSpace::Type),
    ("group", "ref", SymbolSpace::Group),
    ("attributeGroup", "ref", SymbolSpace::AttributeGroup),
];

/// A global component declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    /// Component kind
    pub kind: ComponentKind,
    /// Qualified name
    pub name: QName,
    /// Document that declares it
    pub document: PathBuf,
    /// Declared inside `xs:redefine`
    pub redefined: bool,
}

/// How an import's target was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportOutcome {
    /// Located by the entity resolver
    Resolved,
    /// Located through the `schemaLocation` hint
    Located,
    /// Not located, but the namespace is built in (XSD or XML)
    BuiltIn,
    /// Not located
    Missing,
}

/// One `xs:import` of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    /// Imported namespace (`None` for no namespace)
    pub namespace: Option<String>,
    /// `schemaLocation` hint as written
    pub schema_location: Option<String>,
    /// Document that was loaded for it
    pub target: Option<PathBuf>,
    /// How the target was found
    pub outcome: ImportOutcome,
}

/// A loaded schema document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDocument {
    /// Canonical path
    pub path: PathBuf,
    /// Effective target namespace
    pub target_namespace: Option<String>,
    /// Namespace adopted through a chameleon include
    pub chameleon: bool,
    /// Imports in document order
    pub imports: Vec<ImportRecord>,
    /// Included and redefined documents in document order
    pub includes: Vec<PathBuf>,
}

/// Result of a compilation: documents and global components of a schema set
#[derive(Debug, Clone, Serialize)]
pub struct SchemaGrammars {
    entry: PathBuf,
    documents: Vec<SchemaDocument>,
    components: Vec<Component>,
    #[serde(skip)]
    lookup: HashMap<(SymbolSpace, QName), usize>,
}

impl SchemaGrammars {
    fn new(entry: PathBuf) -> Self {
        Self {
            entry,
            documents: Vec::new(),
            components: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Canonical path of the entry document
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Loaded documents in load order
    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    /// First loaded document at `path`
    pub fn document(&self, path: &Path) -> Option<&SchemaDocument> {
        self.documents.iter().find(|d| d.path == path)
    }

    /// Global components in declaration order
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Look up a global component
    pub fn component(&self, space: SymbolSpace, name: &QName) -> Option<&Component> {
        self.lookup
            .get(&(space, name.clone()))
            .map(|&i| &self.components[i])
    }

    /// Distinct target namespaces, sorted; `""` stands for no namespace
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .documents
            .iter()
            .map(|d| d.target_namespace.as_deref().unwrap_or(""))
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }

    /// Number of loaded documents
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of global components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Options for [`GrammarCompiler`]
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Fail when an import or include cannot be located
    pub strict_imports: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict_imports: true,
            limits: Limits::default(),
        }
    }
}

impl CompileOptions {
    /// Set whether unlocatable imports are fatal
    pub fn with_strict_imports(mut self, strict: bool) -> Self {
        self.strict_imports = strict;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// Compiles a schema set, resolving cross-document references through `R`
#[derive(Debug)]
pub struct GrammarCompiler<R> {
    resolver: R,
    options: CompileOptions,
    loader: Loader,
}

impl<R: EntityResolver> GrammarCompiler<R> {
    /// Create a compiler around a resolver
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            options: CompileOptions::default(),
            loader: Loader::new(),
        }
    }

    /// Set the options
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.loader = Loader::new().with_limits(options.limits.clone());
        self.options = options;
        self
    }

    /// The resolver
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Compile the schema set rooted at `entry`
    pub fn compile(&self, entry: impl AsRef<Path>) -> Result<SchemaGrammars> {
        let entry = entry.as_ref();

        // The root load goes through the resolver like any other reference
        let request = ResolutionRequest::new()
            .with_literal_system_id(Location::Path(entry.to_path_buf()).system_id());
        let start = match self.resolver.resolve(&request) {
            Resolution::Resolved(entity) => entity.system_id,
            Resolution::Skip | Resolution::Unresolved { .. } => entry.to_path_buf(),
        };
        let start = canonical(&start)?;

        let mut session = Session {
            compiler: self,
            grammars: SchemaGrammars::new(start.clone()),
            loaded: HashSet::new(),
            references: Vec::new(),
        };
        session.load(&start, LoadKind::Entry, 0)?;
        session.check_references()?;

        let grammars = session.grammars;
        tracing::info!(
            entry = %grammars.entry.display(),
            documents = grammars.document_count(),
            components = grammars.component_count(),
            "schema set compiled"
        );
        Ok(grammars)
    }
}

/// Why a document is being loaded
enum LoadKind {
    Entry,
    Import {
        namespace: Option<String>,
        resolved: bool,
    },
    Include {
        namespace: Option<String>,
    },
}

impl LoadKind {
    /// Effective namespace the loaded document must end up with
    fn expected_namespace(&self) -> Option<&Option<String>> {
        match self {
            LoadKind::Entry => None,
            LoadKind::Import { namespace, .. } | LoadKind::Include { namespace } => Some(namespace),
        }
    }
}

/// A QName reference waiting for the whole set to be loaded
struct Reference {
    space: SymbolSpace,
    name: QName,
    document: PathBuf,
}

/// State of one compilation
struct Session<'c, R> {
    compiler: &'c GrammarCompiler<R>,
    grammars: SchemaGrammars,
    /// (path, effective namespace) pairs already processed
    loaded: HashSet<(PathBuf, Option<String>)>,
    references: Vec<Reference>,
}

impl<R: EntityResolver> Session<'_, R> {
    fn load(&mut self, path: &Path, kind: LoadKind, depth: usize) -> Result<()> {
        if let Some(expected) = kind.expected_namespace() {
            if self.loaded.contains(&(path.to_path_buf(), expected.clone())) {
                return Ok(());
            }
        }
        self.compiler.options.limits.check_schema_depth(depth)?;

        let doc = self.read(path)?;
        let root = doc
            .root()
            .ok_or_else(|| parse_error(path, "Empty document"))?;

        if root.local_name() != xsd_elements::SCHEMA || root.namespace() != Some(XSD_NAMESPACE) {
            return Err(parse_error(
                path,
                format!("Expected xs:schema root element, got {}", root.qname),
            ));
        }

        let declared = root
            .get_attribute(xsd_attrs::TARGET_NAMESPACE)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);

        let effective = match kind {
            LoadKind::Entry => declared.clone(),
            LoadKind::Import { namespace, resolved } => {
                if declared != namespace {
                    let message = format!(
                        "imported document declares namespace '{}', expected '{}'",
                        declared.as_deref().unwrap_or(""),
                        namespace.as_deref().unwrap_or("")
                    );
                    if resolved {
                        return Err(ConsistencyViolation::new(ViolationKind::NamespaceMismatch, message)
                            .with_document(path)
                            .into());
                    }
                    return Err(parse_error(path, message));
                }
                declared.clone()
            }
            LoadKind::Include { namespace } => match &declared {
                None => namespace,
                Some(ns) if Some(ns) == namespace.as_ref() => declared.clone(),
                Some(ns) => {
                    return Err(parse_error(
                        path,
                        format!(
                            "Included schema has different targetNamespace '{}', expected '{}'",
                            ns,
                            namespace.as_deref().unwrap_or("(none)")
                        ),
                    ));
                }
            },
        };

        if !self.loaded.insert((path.to_path_buf(), effective.clone())) {
            return Ok(());
        }
        self.compiler.options.limits.check_documents(self.loaded.len())?;

        let chameleon = declared.is_none() && effective.is_some();
        tracing::debug!(
            path = %path.display(),
            namespace = effective.as_deref().unwrap_or(""),
            chameleon,
            depth,
            "loading schema document"
        );

        let doc_index = self.grammars.documents.len();
        self.grammars.documents.push(SchemaDocument {
            path: path.to_path_buf(),
            target_namespace: effective.clone(),
            chameleon,
            imports: Vec::new(),
            includes: Vec::new(),
        });

        for child in &root.children {
            if child.namespace() != Some(XSD_NAMESPACE) {
                continue;
            }
            match child.local_name() {
                xsd_elements::IMPORT => self.import(child, path, effective.as_deref(), doc_index, depth)?,
                xsd_elements::INCLUDE => self.include(child, path, effective.as_deref(), doc_index, depth)?,
                xsd_elements::REDEFINE => {
                    self.include(child, path, effective.as_deref(), doc_index, depth)?;
                    for redefinition in &child.children {
                        if redefinition.namespace() != Some(XSD_NAMESPACE) {
                            continue;
                        }
                        if let Some(kind) = ComponentKind::from_local_name(redefinition.local_name()) {
                            self.register(redefinition, kind, path, effective.as_deref(), true)?;
                        }
                    }
                }
                name => {
                    if let Some(kind) = ComponentKind::from_local_name(name) {
                        self.register(child, kind, path, effective.as_deref(), false)?;
                    }
                }
            }
        }

        self.collect_references(root, path, effective.as_deref(), chameleon)
    }

    fn read(&self, path: &Path) -> Result<Document> {
        let content = self.compiler.loader.load(&Location::Path(path.to_path_buf()))?;
        Document::from_string(&content).map_err(|e| match e {
            Error::Xml(msg) => parse_error(path, msg),
            other => other,
        })
    }

    fn import(
        &mut self,
        elem: &Element,
        path: &Path,
        own_namespace: Option<&str>,
        doc_index: usize,
        depth: usize,
    ) -> Result<()> {
        let namespace = elem
            .get_attribute(xsd_attrs::NAMESPACE)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        let location = elem.get_attribute(xsd_attrs::SCHEMA_LOCATION);

        if namespace.as_deref() == own_namespace {
            return Err(parse_error(
                path,
                format!(
                    "xs:import cannot import the schema's own targetNamespace: {:?}",
                    namespace
                ),
            ));
        }

        let mut request = ResolutionRequest::new().with_base_location(Location::Path(path.to_path_buf()).system_id());
        if let Some(ns) = &namespace {
            request = request.with_namespace(ns.clone());
        }
        if let Some(loc) = location {
            request = request.with_literal_system_id(loc);
        }

        let (target, outcome) = match self.compiler.resolver.resolve(&request) {
            Resolution::Resolved(entity) => (Some(canonical(&entity.system_id)?), ImportOutcome::Resolved),
            Resolution::Skip | Resolution::Unresolved { .. } => match location {
                Some(loc) => match locate(path, loc)? {
                    Some(found) => (Some(found), ImportOutcome::Located),
                    None => (None, ImportOutcome::Missing),
                },
                None => (None, ImportOutcome::Missing),
            },
        };
        let outcome = match (&target, namespace.as_deref()) {
            (None, Some(XSD_NAMESPACE | XML_NAMESPACE)) => ImportOutcome::BuiltIn,
            _ => outcome,
        };

        self.grammars.documents[doc_index].imports.push(ImportRecord {
            namespace: namespace.clone(),
            schema_location: location.map(str::to_string),
            target: target.clone(),
            outcome,
        });

        match target {
            Some(target) => self.load(
                &target,
                LoadKind::Import {
                    namespace,
                    resolved: outcome == ImportOutcome::Resolved,
                },
                depth + 1,
            ),
            None if outcome == ImportOutcome::BuiltIn => {
                tracing::debug!(
                    namespace = namespace.as_deref().unwrap_or(""),
                    base = %path.display(),
                    "built-in namespace imported without a local document"
                );
                Ok(())
            }
            None if self.compiler.options.strict_imports => Err(Error::UnresolvedImport {
                namespace: namespace.unwrap_or_default(),
                base: path.display().to_string(),
            }),
            None => {
                tracing::warn!(
                    namespace = namespace.as_deref().unwrap_or(""),
                    base = %path.display(),
                    "import could not be located, continuing"
                );
                Ok(())
            }
        }
    }

    fn include(
        &mut self,
        elem: &Element,
        path: &Path,
        own_namespace: Option<&str>,
        doc_index: usize,
        depth: usize,
    ) -> Result<()> {
        let location = elem.get_attribute(xsd_attrs::SCHEMA_LOCATION).ok_or_else(|| {
            parse_error(path, format!("xs:{} missing schemaLocation attribute", elem.local_name()))
        })?;

        // Includes are identified by location only, so the request carries no key
        let request = ResolutionRequest::new()
            .with_base_location(Location::Path(path.to_path_buf()).system_id())
            .with_literal_system_id(location);

        let target = match self.compiler.resolver.resolve(&request) {
            Resolution::Resolved(entity) => Some(canonical(&entity.system_id)?),
            Resolution::Skip | Resolution::Unresolved { .. } => locate(path, location)?,
        };

        let Some(target) = target else {
            if self.compiler.options.strict_imports {
                return Err(Error::Resource(format!(
                    "Included schema '{}' not found from {}",
                    location,
                    path.display()
                )));
            }
            tracing::warn!(location, base = %path.display(), "include could not be located, continuing");
            return Ok(());
        };

        self.grammars.documents[doc_index].includes.push(target.clone());
        self.load(
            &target,
            LoadKind::Include {
                namespace: own_namespace.map(str::to_string),
            },
            depth + 1,
        )
    }

    fn register(
        &mut self,
        elem: &Element,
        kind: ComponentKind,
        path: &Path,
        namespace: Option<&str>,
        redefined: bool,
    ) -> Result<()> {
        let name = elem
            .get_attribute(xsd_attrs::NAME)
            .ok_or_else(|| parse_error(path, format!("global xs:{} without a name", kind)))?;
        validate_ncname(name).map_err(|e| parse_error(path, e.to_string()))?;

        let qname = QName::new(namespace, name);
        let key = (kind.symbol_space(), qname.clone());
        let component = Component {
            kind,
            name: qname,
            document: path.to_path_buf(),
            redefined,
        };

        match self.grammars.lookup.get(&key) {
            Some(&i) if redefined => {
                self.grammars.components[i] = component;
            }
            Some(&i) => {
                let existing = &self.grammars.components[i];
                if existing.document == path {
                    return Err(parse_error(
                        path,
                        format!("duplicate global xs:{} '{}'", kind, component.name),
                    ));
                }
                return Err(ConsistencyViolation::new(
                    ViolationKind::DuplicateComponent,
                    format!(
                        "{} '{}' already declared in {}",
                        kind,
                        component.name,
                        existing.document.display()
                    ),
                )
                .with_document(path)
                .into());
            }
            None => {
                self.grammars.lookup.insert(key, self.grammars.components.len());
                self.grammars.components.push(component);
                self.compiler
                    .options
                    .limits
                    .check_schema_components(self.grammars.components.len())?;
            }
        }
        Ok(())
    }

    fn collect_references(
        &mut self,
        elem: &Element,
        path: &Path,
        namespace: Option<&str>,
        chameleon: bool,
    ) -> Result<()> {
        for child in &elem.children {
            if child.namespace() != Some(XSD_NAMESPACE) || child.local_name() == xsd_elements::ANNOTATION {
                continue;
            }

            for &(owner, attr, space) in REFERENCE_ATTRIBUTES {
                if child.local_name() != owner {
                    continue;
                }
                let Some(value) = child.get_attribute(attr) else {
                    continue;
                };
                for token in value.split_whitespace() {
                    validate_qname(token).map_err(|e| parse_error(path, e.to_string()))?;
                    let mut name = child.namespaces.resolve(token).map_err(|e| {
                        Error::from(
                            ConsistencyViolation::new(
                                ViolationKind::UnboundPrefix,
                                format!("{} in {}=\"{}\"", e, attr, value),
                            )
                            .with_document(path),
                        )
                    })?;
                    // Chameleon documents pull their unqualified references
                    // into the adopted namespace
                    if chameleon && name.namespace.is_none() {
                        name.namespace = namespace.map(str::to_string);
                    }
                    self.references.push(Reference {
                        space,
                        name,
                        document: path.to_path_buf(),
                    });
                }
            }

            self.collect_references(child, path, namespace, chameleon)?;
        }
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        for reference in &self.references {
            // Built-in namespaces carry no schema document
            if reference.name.is_xsd() || reference.name.namespace.as_deref() == Some(XML_NAMESPACE) {
                continue;
            }
            if self.grammars.component(reference.space, &reference.name).is_none() {
                return Err(ConsistencyViolation::new(
                    ViolationKind::DanglingReference,
                    format!("no {:?} component named {}", reference.space, reference.name),
                )
                .with_document(&reference.document)
                .into());
            }
        }
        Ok(())
    }
}

fn parse_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Parse(ParseError::new(message).with_location(path.display().to_string()))
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| Error::Resource(format!("Failed to read schema '{}': {}", path.display(), e)))
}

/// Resolve a `schemaLocation` hint relative to the referencing document
fn locate(base: &Path, location: &str) -> Result<Option<PathBuf>> {
    let target = Location::Path(base.to_path_buf()).join(location)?;
    let Some(candidate) = target.as_path() else {
        tracing::warn!(location = %target, "remote schemaLocation ignored");
        return Ok(None);
    };
    match candidate.canonicalize() {
        Ok(found) => Ok(Some(found)),
        Err(e) => {
            tracing::warn!(location, error = %e, "schemaLocation does not exist");
            Ok(None)
        }
    }
}
