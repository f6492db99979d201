use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use engine::{Engine, ImportBatch, ImportSummary};

use crate::{
    AccountMap, ImportError, Importer, ParseRequest, ResultImport, bnp::BnpImporter,
    firefly::FireflyImporter, monobank::MonobankImporter, privat24::Privat24Importer,
    revolut::RevolutImporter,
};

/// An import as callers send it: payloads are base64 encoded files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportRequest {
    pub source: String,
    pub content: Vec<String>,
    pub skip_rules: bool,
    /// Tag names added to every imported transaction; unknown names are
    /// created.
    pub tags: Vec<String>,
}

/// Routes payloads to the importer for their source and stores the result.
pub struct ImportService {
    engine: Arc<Engine>,
    importers: Vec<Box<dyn Importer>>,
}

impl std::fmt::Debug for ImportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportService")
            .field("sources", &self.sources().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ImportService {
    pub fn new(engine: Arc<Engine>) -> ResultImport<Self> {
        Ok(Self {
            engine,
            importers: vec![
                Box::new(Privat24Importer::new()?),
                Box::new(MonobankImporter),
                Box::new(BnpImporter),
                Box::new(FireflyImporter),
                Box::new(RevolutImporter),
            ],
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.importers.iter().map(|importer| importer.source())
    }

    fn importer(&self, source: &str) -> ResultImport<&dyn Importer> {
        self.importers
            .iter()
            .find(|importer| importer.source().eq_ignore_ascii_case(source.trim()))
            .map(|importer| importer.as_ref())
            .ok_or_else(|| ImportError::UnknownSource(source.to_string()))
    }

    /// Decode and import a request.
    pub async fn import(&self, request: ImportRequest) -> ResultImport<ImportSummary> {
        let payloads = request
            .content
            .iter()
            .map(|encoded| STANDARD.decode(encoded.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        self.import_raw(&request.source, &payloads, request.skip_rules, &request.tags)
            .await
    }

    /// Import already decoded payloads.
    pub async fn import_raw(
        &self,
        source: &str,
        payloads: &[Vec<u8>],
        skip_rules: bool,
        tags: &[String],
    ) -> ResultImport<ImportSummary> {
        let importer = self.importer(source)?;

        let accounts = AccountMap::new(self.engine.list_accounts().await?)?;
        let mut tag_ids: HashMap<String, i32> = self
            .engine
            .list_tags()
            .await?
            .into_iter()
            .map(|tag| (tag.name, tag.id))
            .collect();
        let categories: HashMap<String, i32> = self
            .engine
            .list_categories()
            .await?
            .into_iter()
            .map(|category| (category.name, category.id))
            .collect();

        let mut batch_tags = BTreeSet::new();
        for name in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let id = match tag_ids.get(name) {
                Some(id) => *id,
                None => {
                    let tag = self.engine.create_tag(name).await?;
                    tracing::info!(tag = %tag.name, "tag created for import");
                    tag_ids.insert(tag.name, tag.id);
                    tag.id
                }
            };
            batch_tags.insert(id);
        }

        let mut items = Vec::new();
        let mut merged = 0;
        for data in payloads {
            let response = importer.parse(&ParseRequest {
                data: data.as_slice(),
                accounts: &accounts,
                tags: &tag_ids,
                categories: &categories,
            })?;
            merged += response.merged;
            items.extend(response.items);
        }
        tracing::info!(
            source = importer.source(),
            payloads = payloads.len(),
            parsed = items.len(),
            merged,
            "import parsed"
        );

        Ok(self
            .engine
            .import_transactions(ImportBatch {
                source: importer.source().to_string(),
                items,
                skip_rules,
                tag_ids: batch_tags,
            })
            .await?)
    }
}
