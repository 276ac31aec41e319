use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fxlab_contracts::events::EventLog;
use fxlab_contracts::nodes::{NodeInputs, NodeValue};
use fxlab_contracts::payload::{ReferenceRole, ReferenceSet};
use fxlab_contracts::{AspectRatio, Credentials, ImageTensor};
use fxlab_engine::codec::{encode_for_upload, strip_data_uri};
use fxlab_engine::{default_node_registry, ImageFxNode, RemoteClient, ServiceConfig, WhiskNode};
use httpmock::prelude::*;
use ndarray::Array4;
use serde_json::json;

const TOKEN: &str = "ya29.integration";
const BEARER: &str = "Bearer ya29.integration";

fn write_credentials(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("googel.json");
    fs::write(
        &path,
        json!({
            "access_token": TOKEN,
            "user": {"name": "tester"},
            "cookies": [{"name": "__Secure-next-auth.session-token", "value": "cookie-value"}],
        })
        .to_string(),
    )?;
    Ok(path)
}

fn config_for(server: &MockServer) -> ServiceConfig {
    ServiceConfig::default()
        .with_labs_base(&server.base_url())
        .with_sandbox_base(&server.base_url())
        .with_timeout(Some(Duration::from_secs(10)))
}

fn client_for(server: &MockServer) -> anyhow::Result<RemoteClient> {
    RemoteClient::new(config_for(server), Arc::new(Credentials::new(TOKEN)))
}

/// Raw base64 JPEG of a solid-colour frame, as the generation endpoint returns it.
fn jpeg_base64(height: usize, width: usize, value: f32) -> anyhow::Result<String> {
    let tensor = ImageTensor::new(Array4::from_elem((1, height, width, 3), value))?;
    Ok(strip_data_uri(&encode_for_upload(&tensor)?).to_string())
}

fn reference(value: f32) -> anyhow::Result<ImageTensor> {
    ImageTensor::new(Array4::from_elem((1, 24, 24, 3), value))
}

#[test]
fn imagefx_returns_decoded_batch_and_echoed_seed() -> anyhow::Result<()> {
    let server = MockServer::start();
    let generation = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .header("authorization", BEARER)
            .header("cookie", "__Secure-next-auth.session-token=cookie-value")
            .header("referer", "https://labs.google/")
            .json_body_partial(
                json!({
                    "userInput": {
                        "candidatesCount": 2,
                        "prompts": ["a red bicycle"],
                        "isExpandedPrompt": false,
                        "seed": 42
                    },
                    "clientContext": {"tool": "IMAGE_FX"},
                    "aspectRatio": "IMAGE_ASPECT_RATIO_SQUARE",
                    "modelInput": {"modelNameType": "IMAGEN_3_1"}
                })
                .to_string(),
            );
        then.status(200).json_body(json!({
            "imagePanels": [{
                "prompt": "a red bicycle leaning on a wall",
                "generatedImages": [
                    {"encodedImage": jpeg_base64(32, 32, 0.8).unwrap_or_default(), "seed": 123456},
                    {"encodedImage": jpeg_base64(32, 32, 0.3).unwrap_or_default(), "seed": 654321}
                ]
            }]
        }));
    });

    let temp = tempfile::tempdir()?;
    let config = config_for(&server).with_credentials_path(write_credentials(temp.path())?);
    let registry = default_node_registry(&config)?;
    let node = registry.get("ComfyUI-ImageFx").expect("registered");
    let outputs = node.execute(
        &NodeInputs::new()
            .with("prompt", NodeValue::String("a red bicycle".to_string()))
            .with("seed", NodeValue::Int(42))
            .with("aspect_ratio", NodeValue::String("1:1 (Square)".to_string()))
            .with("num_images", NodeValue::Int(2)),
    )?;

    generation.assert();
    let images = outputs[0].as_image().expect("image output");
    assert_eq!(images.batch(), 2);
    assert_eq!((images.height(), images.width()), (32, 32));
    assert!(!images.is_all_zero());
    assert_eq!(outputs[1].as_str(), Some("123456"));
    Ok(())
}

#[test]
fn imagefx_echoes_input_seed_when_service_omits_it() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1:runImageFx");
        then.status(200).json_body(json!({
            "imagePanels": [{
                "generatedImages": [
                    {"encodedImage": jpeg_base64(16, 16, 0.5).unwrap_or_default()},
                    {"encodedImage": jpeg_base64(16, 16, 0.6).unwrap_or_default()}
                ]
            }]
        }));
    });

    let node = ImageFxNode::new(client_for(&server)?, EventLog::disabled());
    let result = node.generate("a red bicycle", 42, AspectRatio::Square, 2);
    assert!(!result.placeholder);
    assert_eq!(result.images.batch(), 2);
    assert_eq!(result.seed, "42");
    Ok(())
}

#[test]
fn imagefx_seed_is_reduced_modulo_one_million() -> anyhow::Result<()> {
    let server = MockServer::start();
    let generation = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .json_body_partial(r#"{"userInput": {"seed": 42}, "clientContext": {"tool": "IMAGE_FX"}}"#);
        then.status(200).json_body(json!({
            "imagePanels": [{"generatedImages": [
                {"encodedImage": jpeg_base64(8, 8, 0.5).unwrap_or_default()}
            ]}]
        }));
    });

    let node = ImageFxNode::new(client_for(&server)?, EventLog::disabled());
    let result = node.generate("lighthouse", 1_000_042, AspectRatio::Landscape, 1);
    generation.assert();
    assert!(!result.placeholder);
    assert_eq!(result.seed, "1000042");
    Ok(())
}

#[test]
fn imagefx_node_reduces_out_of_range_seed_instead_of_clamping() -> anyhow::Result<()> {
    let server = MockServer::start();
    let reduced = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .json_body_partial(r#"{"userInput": {"seed": 42}}"#);
        then.status(500).body("unavailable");
    });

    let temp = tempfile::tempdir()?;
    let config = config_for(&server).with_credentials_path(write_credentials(temp.path())?);
    let registry = default_node_registry(&config)?;
    let outputs = registry.get("ComfyUI-ImageFx").expect("registered").execute(
        &NodeInputs::new()
            .with("prompt", NodeValue::String("lighthouse".to_string()))
            .with("seed", NodeValue::Int(1_000_042))
            .with("aspect_ratio", NodeValue::String("16:9 (Landscape)".to_string()))
            .with("num_images", NodeValue::Int(1)),
    )?;

    reduced.assert();
    assert_eq!(outputs[1].as_str(), Some("1000042"));
    Ok(())
}

#[test]
fn whisk_node_reduces_seed_at_the_modulus() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/fx/api/trpc/backbone.generateStoryBoardPrompt");
        then.status(200)
            .json_body(json!({"result": {"data": {"json": "a quiet harbour"}}}));
    });
    let reduced = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .json_body_partial(r#"{"userInput": {"seed": 0}, "clientContext": {"tool": "BACKBONE"}}"#);
        then.status(500).body("unavailable");
    });

    let temp = tempfile::tempdir()?;
    let config = config_for(&server).with_credentials_path(write_credentials(temp.path())?);
    let registry = default_node_registry(&config)?;
    let outputs = registry.get("ComfyUI-Whisk").expect("registered").execute(
        &NodeInputs::new()
            .with("prompt", NodeValue::String("a quiet harbour".to_string()))
            .with("num_images", NodeValue::Int(1))
            .with("seed", NodeValue::Int(2_147_483_647)),
    )?;

    reduced.assert();
    let images = outputs[0].as_image().expect("image output");
    assert_eq!(images.batch(), 1);
    assert!(images.is_all_zero());
    Ok(())
}

#[test]
fn short_or_failed_generation_yields_placeholder_batch() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mut short = server.mock(|when, then| {
        when.method(POST).path("/v1:runImageFx");
        then.status(200).json_body(json!({
            "imagePanels": [{"generatedImages": [
                {"encodedImage": jpeg_base64(8, 8, 0.5).unwrap_or_default(), "seed": 5}
            ]}]
        }));
    });

    let node = ImageFxNode::new(client_for(&server)?, EventLog::disabled());
    let result = node.generate("three please", 17, AspectRatio::Portrait, 3);
    assert!(result.placeholder);
    assert_eq!(result.images.batch(), 3);
    assert_eq!((result.images.height(), result.images.width()), (512, 512));
    assert!(result.images.is_all_zero());
    assert_eq!(result.seed, "17");
    short.delete();

    server.mock(|when, then| {
        when.method(POST).path("/v1:runImageFx");
        then.status(403).body("forbidden");
    });
    let result = node.generate("denied", 8, AspectRatio::Square, 2);
    assert!(result.placeholder);
    assert_eq!(result.images.batch(), 2);
    assert_eq!(result.seed, "8");
    Ok(())
}

#[test]
fn whisk_keeps_captions_when_generation_fails() -> anyhow::Result<()> {
    let server = MockServer::start();
    let captions = [
        ("CHARACTER", "a knight in silver armour"),
        ("LOCATION", "a ruined abbey"),
        ("STYLE", "thick oil paint"),
    ]
    .map(|(category, caption)| {
        server.mock(|when, then| {
            when.method(POST)
                .path("/fx/api/trpc/backbone.generateCaption")
                .header("referer", "https://labs.google/fx/zh/tools/whisk")
                .json_body_partial(json!({"json": {"category": category}}).to_string());
            then.status(200)
                .json_body(json!({"result": {"data": {"json": caption}}}));
        })
    });
    let storyboard = server.mock(|when, then| {
        when.method(POST)
            .path("/fx/api/trpc/backbone.generateStoryBoardPrompt")
            .json_body_partial(
                json!({
                    "json": {
                        "characters": [{"category": "CHARACTER", "index": 0, "prompt": "a knight in silver armour"}],
                        "location": {"category": "LOCATION", "index": 1, "prompt": "a ruined abbey"},
                        "style": {"category": "STYLE", "index": 2, "prompt": "thick oil paint"},
                        "pose": null,
                        "additionalInput": "at dawn",
                        "numImages": 2
                    },
                    "meta": {"values": {"pose": ["undefined"]}}
                })
                .to_string(),
            );
        then.status(200).json_body(
            json!({"result": {"data": {"json": "A knight in silver armour at dawn in a ruined abbey, thick oil paint"}}}),
        );
    });
    let generation = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .json_body_partial(r#"{"clientContext": {"tool": "BACKBONE"}}"#);
        then.status(500).body("internal error");
    });

    let temp = tempfile::tempdir()?;
    let config = config_for(&server).with_credentials_path(write_credentials(temp.path())?);
    let registry = default_node_registry(&config)?;
    let node = registry.get("ComfyUI-Whisk").expect("registered");
    let outputs = node.execute(
        &NodeInputs::new()
            .with("prompt", NodeValue::String("at dawn".to_string()))
            .with("num_images", NodeValue::Int(2))
            .with("seed", NodeValue::Int(7))
            .with("subject_image", NodeValue::Image(reference(0.2)?))
            .with("scene_image", NodeValue::Image(reference(0.5)?))
            .with("style_image", NodeValue::Image(reference(0.8)?)),
    )?;

    for caption in &captions {
        caption.assert();
    }
    storyboard.assert();
    generation.assert();

    let images = outputs[0].as_image().expect("image output");
    assert_eq!(images.batch(), 2);
    assert_eq!((images.height(), images.width()), (512, 512));
    assert!(images.is_all_zero());
    assert_eq!(outputs[1].as_str(), Some("a knight in silver armour"));
    assert_eq!(outputs[2].as_str(), Some("a ruined abbey"));
    assert_eq!(outputs[3].as_str(), Some("thick oil paint"));
    assert_eq!(outputs[4].as_str(), Some("[]"));
    Ok(())
}

#[test]
fn whisk_seed_is_reduced_modulo_int_max() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/fx/api/trpc/backbone.generateStoryBoardPrompt")
            .json_body_partial(r#"{"json": {"characters": [], "location": null, "style": null}, "meta": {}}"#);
        then.status(200)
            .json_body(json!({"result": {"data": {"json": "a quiet harbour"}}}));
    });
    let generation = server.mock(|when, then| {
        when.method(POST)
            .path("/v1:runImageFx")
            .json_body_partial(
                json!({
                    "userInput": {"seed": 2, "prompts": ["a quiet harbour"], "candidatesCount": 1},
                    "clientContext": {"tool": "BACKBONE"},
                    "aspectRatio": "IMAGE_ASPECT_RATIO_LANDSCAPE"
                })
                .to_string(),
            );
        then.status(200).json_body(json!({
            "imagePanels": [{
                "prompt": "a quiet harbour at night",
                "generatedImages": [{"encodedImage": jpeg_base64(16, 16, 0.4).unwrap_or_default()}]
            }]
        }));
    });

    let node = WhiskNode::new(client_for(&server)?, EventLog::disabled());
    let output = node.generate(
        "a quiet harbour",
        ReferenceSet::new(),
        1,
        2_147_483_649,
        AspectRatio::Landscape,
    );
    generation.assert();
    assert!(!output.generation.placeholder);
    assert_eq!(output.generation.seed, "2147483649");
    assert_eq!(output.prompts_json(), r#"["a quiet harbour at night"]"#);
    Ok(())
}

#[test]
fn whisk_skips_generation_when_storyboard_fails() -> anyhow::Result<()> {
    let server = MockServer::start();
    let caption = server.mock(|when, then| {
        when.method(POST).path("/fx/api/trpc/backbone.generateCaption");
        then.status(200)
            .json_body(json!({"result": {"data": {"json": "watercolour wash"}}}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/fx/api/trpc/backbone.generateStoryBoardPrompt")
            .json_body_partial(
                r#"{"json": {"characters": [], "location": null}, "meta": {"values": {"location": ["undefined"], "pose": ["undefined"]}}}"#,
            );
        then.status(200).json_body(json!({"unexpected": true}));
    });
    let generation = server.mock(|when, then| {
        when.method(POST).path("/v1:runImageFx");
        then.status(200).json_body(json!({"imagePanels": []}));
    });

    let node = WhiskNode::new(client_for(&server)?, EventLog::disabled());
    let output = node.generate(
        "",
        ReferenceSet::new().with(ReferenceRole::Style, &reference(0.6)?),
        3,
        11,
        AspectRatio::Square,
    );
    caption.assert();
    assert_eq!(generation.hits(), 0);
    assert!(output.generation.placeholder);
    assert_eq!(output.generation.images.batch(), 3);
    assert_eq!(output.style_prompt, "watercolour wash");
    assert_eq!(output.subject_prompt, "");
    Ok(())
}
