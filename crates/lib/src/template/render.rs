//! Render templates into a manifest.

use tracing::debug;

use super::ManifestTemplate;
use crate::manifest::RenderedManifest;
use crate::resolve::{ResolveError, Resolver};

/// Renders one or more templates with a single resolver.
///
/// Each template's referenced names are resolved up front, so a missing
/// variable fails the whole template before any text is produced.
pub struct Renderer<'a> {
  resolver: Resolver<'a>,
}

impl<'a> Renderer<'a> {
  pub fn new(resolver: Resolver<'a>) -> Self {
    Self { resolver }
  }

  /// Render a single parsed template.
  pub fn render(&self, template: &ManifestTemplate) -> Result<RenderedManifest, ResolveError> {
    let vars = self.resolver.resolve(template.references())?;
    let documents = template.render(&vars)?;

    debug!(
      template = template.name(),
      documents = documents.len(),
      variables = vars.len(),
      "rendered template"
    );

    Ok(RenderedManifest::new(documents))
  }

  /// Render several templates in order, concatenating their documents.
  pub fn render_all<'t, I>(&self, templates: I) -> Result<RenderedManifest, ResolveError>
  where
    I: IntoIterator<Item = &'t ManifestTemplate>,
  {
    let mut manifest = RenderedManifest::default();
    for template in templates {
      manifest.extend(self.render(template)?);
    }
    Ok(manifest)
  }
}
