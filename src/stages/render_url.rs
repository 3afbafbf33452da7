use reqwest::Url;

use crate::avatar::AvatarContext;
use crate::config::{MODEL_EXTENSION, RENDER_EXTENSION};
use crate::error::{AvatarError, AvatarResult, FailureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderScene {
    #[default]
    FullbodyPortrait,
    HalfbodyPortrait,
    FullbodyPostureTransparent,
}

impl RenderScene {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderScene::FullbodyPortrait => "fullbody-portrait-v1",
            RenderScene::HalfbodyPortrait => "halfbody-portrait-v1",
            RenderScene::FullbodyPostureTransparent => "fullbody-posture-v1-transparent",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendShape {
    pub mesh: String,
    pub name: String,
    pub weight: f32,
}

/// Parameters of a 2D render request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderSettings {
    pub scene: RenderScene,
    /// Square image size in pixels; the service default when unset.
    pub size: Option<u32>,
    /// Opaque background colour as RGB.
    pub background: Option<[u8; 3]>,
    pub blend_shapes: Vec<BlendShape>,
}

impl RenderSettings {
    pub fn new(scene: RenderScene) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = Some(rgb);
        self
    }

    pub fn with_blend_shape(mut self, mesh: &str, name: &str, weight: f32) -> Self {
        self.blend_shapes.push(BlendShape {
            mesh: mesh.to_string(),
            name: name.to_string(),
            weight,
        });
        self
    }
}

/// Derives the render request URL from a context. Must be free of side effects.
pub trait RenderUrlBuilder: Send + Sync {
    fn render_url(&self, context: &AvatarContext) -> AvatarResult<String>;
}

/// Default builder: the model URL with a `.png` extension and the settings as query.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderParameters;

impl RenderUrlBuilder for RenderParameters {
    fn render_url(&self, context: &AvatarContext) -> AvatarResult<String> {
        render_url_for(&context.avatar_uri.model_url, &context.render_settings)
    }
}

pub fn render_url_for(model_url: &str, settings: &RenderSettings) -> AvatarResult<String> {
    let invalid = |reason: &str| {
        AvatarError::new(
            FailureType::InvalidInput,
            format!("cannot build render url from '{}': {}", model_url, reason),
        )
    };

    let mut url = Url::parse(model_url).map_err(|e| invalid(&e.to_string()))?;
    let suffix = format!(".{}", MODEL_EXTENSION);
    let guid = url
        .path_segments()
        .and_then(|segments| segments.last())
        .and_then(|file| file.strip_suffix(suffix.as_str()))
        .filter(|guid| !guid.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid("not a model url"))?;

    url.path_segments_mut()
        .map_err(|_| invalid("url cannot carry a path"))?
        .pop()
        .push(&format!("{}.{}", guid, RENDER_EXTENSION));
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("scene", settings.scene.as_str());
        if let Some(size) = settings.size {
            query.append_pair("size", &size.to_string());
        }
        if let Some([r, g, b]) = settings.background {
            query.append_pair("background", &format!("{},{},{}", r, g, b));
        }
        for shape in &settings.blend_shapes {
            query.append_pair(
                &format!("blendShapes[{}][{}]", shape.mesh, shape.name),
                &shape.weight.to_string(),
            );
        }
    }

    Ok(url.to_string())
}
