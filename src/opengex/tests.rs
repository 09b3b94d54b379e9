use super::{Axis, ImportOptions};
use crate::error::ImportError;
use crate::math::{Matrix4, Vector3};
use crate::resource::{MaterialBinding, Resource, UNUSED_BONE};
use crate::scene::{NodeId, Scene, SceneGraph};
use crate::{import_opengex, import_opengex_into, ImportResult};
use std::f32::consts::FRAC_PI_2;

fn import(source: &str) -> ImportResult<Scene> {
    import_opengex(source.as_bytes(), &ImportOptions::default())
}

fn import_clean(source: &str) -> Scene {
    let result = import(source);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    result.scene
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1.0e-5
}

const TRIANGLE_OBJECT: &str = r#"
GeometryObject $geometry1
{
    Mesh (primitive = "triangles")
    {
        VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
        IndexArray {unsigned_int32[3] {{0, 1, 2}}}
    }
}
"#;

const RED_MATERIAL: &str = r#"
Material $material1
{
    Name {string {"Red"}}
    Color (attrib = "diffuse") {float[3] {{1, 0, 0}}}
}
"#;

const BOX_NODE: &str = r#"
GeometryNode $node1
{
    Name {string {"Box"}}
    ObjectRef {ref {$geometry1}}
    MaterialRef {ref {$material1}}
}
"#;

// ── Metrics ─────────────────────────────────────────────────────────

#[test]
fn test_metric_distance_sets_multiplier_only() {
    let result = import(r#"Metric (key = "distance") {float {0.5}}"#);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.metrics.distance, 0.5);
    assert!(result.scene.nodes().is_empty());
    assert!(result.scene.resources().is_empty());
}

#[test]
fn test_metric_defaults_and_axes() {
    let result = import("");
    assert_eq!(result.metrics.distance, 1.0);
    assert_eq!(result.metrics.angle, 1.0);
    assert_eq!(result.metrics.time, 1.0);
    assert_eq!(result.metrics.up, Axis::PositiveZ);

    let result = import(
        r#"
        Metric (key = "up") {string {"y"}}
        Metric (key = "forward") {string {"-z"}}
        "#,
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.metrics.up, Axis::PositiveY);
    assert_eq!(result.metrics.forward, Axis::NegativeZ);
}

#[test]
fn test_metric_errors() {
    let result = import(r#"Metric (key = "up") {string {"x"}}"#);
    assert_eq!(result.errors.len(), 1);
    let result = import(r#"Metric (key = "weight") {float {1}}"#);
    assert_eq!(result.errors.len(), 1);
    let result = import(r#"Metric (key = "distance") {float {0}}"#);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.metrics.distance, 1.0);
}

#[test]
fn test_metric_scales_translation_regardless_of_position() {
    let scene = import_clean(
        r#"
        Node { Translation {float[3] {{1, 2, 3}}} }
        Metric (key = "distance") {float {2}}
        "#,
    );
    let local = scene.nodes()[0].local_transform;
    assert_eq!(local, Matrix4::translation(Vector3::new(2.0, 4.0, 6.0)));
}

// ── Nodes and transforms ────────────────────────────────────────────

#[test]
fn test_single_named_root_node() {
    let scene = import_clean(r#"Node $root { Name {string {"Root"}} }"#);
    assert_eq!(scene.nodes().len(), 1);
    let node = &scene.nodes()[0];
    assert_eq!(node.tag, "Root");
    assert_eq!(node.parent, None);
    assert_eq!(node.local_transform, Matrix4::IDENTITY);
}

#[test]
fn test_nested_nodes_and_world_transform() {
    let scene = import_clean(
        r#"
        Node $parent
        {
            Translation {float[3] {{1, 0, 0}}}
            BoneNode $child
            {
                Name {string {"Child"}}
                Translation (kind = "y") {float {2}}
            }
        }
        "#,
    );
    let child = scene.find_node("Child").expect("child node");
    let parent = scene.node(child).parent.expect("parent link");
    assert_eq!(scene.node(parent).tag, "parent");
    assert_eq!(scene.node(parent).children, vec![child]);
    let world = scene.world_transform(child);
    assert!(world.approx_eq(&Matrix4::translation(Vector3::new(1.0, 2.0, 0.0)), 1.0e-6));
}

#[test]
fn test_rotation_about_x_is_pure_x_rotation() {
    let scene = import_clean(r#"Node { Rotation (kind = "x") {float {1.5707964}} }"#);
    let m = scene.nodes()[0].local_transform;
    assert!(m.approx_eq(&Matrix4::rotation_x(FRAC_PI_2), 1.0e-6));
    // The X axis is fixed, Y goes to Z.
    assert!(approx(m.get(0, 0), 1.0));
    assert!(approx(m.get(1, 0), 0.0) && approx(m.get(2, 0), 0.0));
    assert!(approx(m.get(2, 1), 1.0));
    assert!(approx(m.get(1, 1), 0.0));
}

#[test]
fn test_rotation_without_kind_is_quaternion() {
    let scene = import_clean(r#"Node { Rotation {float {0, 0, 0.70710677, 0.70710677}} }"#);
    let m = scene.nodes()[0].local_transform;
    assert!(m.approx_eq(&Matrix4::rotation_z(FRAC_PI_2), 1.0e-5));
}

#[test]
fn test_rotation_without_kind_needs_four_components() {
    let result = import(r#"Node { Rotation {float {0, 0, 1}} }"#);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("4 components"));
    // The node itself survives with the faulty transform skipped.
    assert_eq!(result.scene.nodes().len(), 1);
    assert_eq!(result.scene.nodes()[0].local_transform, Matrix4::IDENTITY);
}

#[test]
fn test_axis_rotation_and_angle_metric() {
    let scene = import_clean(
        r#"
        Metric (key = "angle") {float {0.017453292}}
        Node { Rotation (kind = "axis") {float {90, 0, 0, 1}} }
        "#,
    );
    let m = scene.nodes()[0].local_transform;
    assert!(m.approx_eq(&Matrix4::rotation_z(FRAC_PI_2), 1.0e-5));
}

#[test]
fn test_transforms_compose_in_order() {
    let scene = import_clean(
        r#"
        Node
        {
            Translation {float[3] {{1, 0, 0}}}
            Scale (kind = "x") {float {3}}
        }
        "#,
    );
    let expected = Matrix4::translation(Vector3::new(1.0, 0.0, 0.0))
        * Matrix4::scale(Vector3::new(3.0, 1.0, 1.0));
    assert_eq!(scene.nodes()[0].local_transform, expected);
}

#[test]
fn test_matrix_transform_is_column_major() {
    let scene = import_clean(
        r#"Node { Transform {float[16] {{1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 5, 6, 7, 1}}} }"#,
    );
    let m = scene.nodes()[0].local_transform;
    assert_eq!((m.get(0, 3), m.get(1, 3), m.get(2, 3)), (5.0, 6.0, 7.0));
}

#[test]
fn test_node_property_errors_reject_node() {
    let result = import(r#"Node (foo = 1) {} Node $ok {}"#);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(&result.errors[0], ImportError::Structure { identifier, .. } if identifier == "Node"));
    assert_eq!(result.scene.nodes().len(), 1);
    assert_eq!(result.scene.nodes()[0].tag, "ok");
}

// ── Geometry ────────────────────────────────────────────────────────

#[test]
fn test_index_array_rows_flatten() {
    let scene = import_clean(
        r#"
        GeometryObject $quad
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}, {1, 1, 0}}}
                IndexArray {unsigned_int32[3] {{0, 1, 2}, {2, 1, 3}}}
            }
        }
        "#,
    );
    let mesh = scene.resource("quad").and_then(Resource::as_mesh).expect("mesh");
    assert_eq!(mesh.num_vertices(), 4);
    assert_eq!(mesh.index_buffers.len(), 1);
    assert_eq!(mesh.index_buffers[0].indices, vec![0, 1, 2, 2, 1, 3]);
    assert_eq!(mesh.index_buffers[0].num_indices(), 6);
}

#[test]
fn test_mesh_without_vertex_array_fails() {
    let result = import(
        r#"
        GeometryNode $node { ObjectRef {ref {$empty}} }
        GeometryObject $empty { Mesh { IndexArray {unsigned_int32[3] {{0, 1, 2}}} } }
        "#,
    );
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string() == "Mesh: missing required substructure 'VertexArray'"));
    assert!(result.scene.resource("empty").is_none());
    assert!(!result
        .scene
        .resources()
        .values()
        .any(|r| r.as_mesh_instance().is_some()));
}

#[test]
fn test_vertex_attributes_and_default_uv() {
    let scene = import_clean(
        r#"
        GeometryObject $g
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
                VertexArray (attrib = "normal") {float[3] {{0, 0, 1}, {0, 0, 1}, {0, 0, 1}}}
                VertexArray (attrib = "color") {float[3] {{1, 1, 1}, {1, 1, 1}, {1, 1, 1}}}
            }
        }
        "#,
    );
    let mesh = scene.resource("g").and_then(Resource::as_mesh).expect("mesh");
    assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
    assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 1.0]);
    assert_eq!(mesh.vertices[1].uv, [0.0, 1.0]);
    assert_eq!(mesh.interleaved().len(), 3 * 8);
    // No IndexArray: vertices are drawn in order.
    assert_eq!(mesh.index_buffers[0].indices, vec![0, 1, 2]);
}

#[test]
fn test_vertex_count_mismatch_fails() {
    let result = import(
        r#"
        GeometryObject $g
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
                VertexArray (attrib = "texcoord") {float[2] {{0, 0}, {1, 0}}}
            }
        }
        "#,
    );
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("texcoord"));
    assert!(result.scene.resource("g").is_none());
}

#[test]
fn test_clockwise_front_flips_winding() {
    let scene = import_clean(
        r#"
        GeometryObject $g
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
                IndexArray (front = "cw") {unsigned_int16 {0, 1, 2}}
            }
        }
        "#,
    );
    let mesh = scene.resource("g").and_then(Resource::as_mesh).expect("mesh");
    assert_eq!(mesh.index_buffers[0].indices, vec![0, 2, 1]);
}

#[test]
fn test_index_out_of_range_fails() {
    let result = import(
        r#"
        GeometryObject $g
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
                IndexArray {unsigned_int32[3] {{0, 1, 3}}}
            }
        }
        "#,
    );
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("out of range"));
}

#[test]
fn test_distance_metric_scales_positions() {
    let scene = import_clean(&format!(
        r#"Metric (key = "distance") {{float {{0.01}}}} {}"#,
        TRIANGLE_OBJECT
    ));
    let mesh = scene.resource("geometry1").and_then(Resource::as_mesh).expect("mesh");
    assert!(approx(mesh.vertices[1].position[0], 0.01));
}

#[test]
fn test_lowest_lod_is_used() {
    let scene = import_clean(
        r#"
        GeometryObject $g
        {
            Mesh (lod = 1) { VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}} }
            Mesh (lod = 0)
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}, {1, 1, 0}, {2, 2, 0}, {3, 3, 0}}}
            }
        }
        "#,
    );
    let mesh = scene.resource("g").and_then(Resource::as_mesh).expect("mesh");
    assert_eq!(mesh.num_vertices(), 6);
}

#[test]
fn test_unsupported_primitive_fails() {
    let result = import(
        r#"
        GeometryObject $g
        {
            Mesh (primitive = "lines") { VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}}} }
        }
        "#,
    );
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("lines"));
}

// ── Instances and materials ─────────────────────────────────────────

fn instance_material(scene: &Scene, name: &str) -> MaterialBinding {
    scene
        .resource(name)
        .and_then(Resource::as_mesh_instance)
        .unwrap_or_else(|| panic!("missing instance {}", name))
        .material
        .clone()
}

#[test]
fn test_material_after_material_ref_still_binds() {
    let source = format!("{}{}{}", BOX_NODE, TRIANGLE_OBJECT, RED_MATERIAL);
    let scene = import_clean(&source);
    assert_eq!(
        instance_material(&scene, "Box/0"),
        MaterialBinding::Bound("material1".to_string())
    );
    let material = scene.resource("material1").and_then(Resource::as_material).expect("material");
    assert_eq!(material.name, "Red");
    assert_eq!(material.colors["diffuse"], [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_binding_is_independent_of_definition_order() {
    let orders = [
        format!("{}{}{}", BOX_NODE, TRIANGLE_OBJECT, RED_MATERIAL),
        format!("{}{}{}", RED_MATERIAL, TRIANGLE_OBJECT, BOX_NODE),
        format!("{}{}{}", TRIANGLE_OBJECT, BOX_NODE, RED_MATERIAL),
        format!("{}{}{}", RED_MATERIAL, BOX_NODE, TRIANGLE_OBJECT),
    ];
    let scenes: Vec<Scene> = orders.iter().map(|s| import_clean(s)).collect();
    for scene in &scenes {
        let instance = scene
            .resource("Box/0")
            .and_then(Resource::as_mesh_instance)
            .expect("instance");
        assert_eq!(instance.mesh, "geometry1");
        assert_eq!(instance.index_buffer, 0);
        assert_eq!(instance.material, MaterialBinding::Bound("material1".to_string()));
        assert_eq!(scene.node(instance.node).tag, "Box");
    }
}

#[test]
fn test_slot_without_material_ref_is_unbound() {
    let source = format!(
        "{}{}",
        r#"GeometryNode { Name {string {"Plain"}} ObjectRef {ref {$geometry1}} }"#,
        TRIANGLE_OBJECT
    );
    let scene = import_clean(&source);
    assert_eq!(instance_material(&scene, "Plain/0"), MaterialBinding::Unbound);
}

#[test]
fn test_one_instance_per_index_array() {
    let scene = import_clean(
        r#"
        GeometryNode $n
        {
            ObjectRef {ref {$g}}
            MaterialRef (index = 1) {ref {$m}}
        }
        GeometryObject $g
        {
            Mesh
            {
                VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
                IndexArray (material = 0) {unsigned_int32[3] {{0, 1, 2}}}
                IndexArray (material = 1) {unsigned_int32[3] {{2, 1, 0}}}
            }
        }
        Material $m {}
        "#,
    );
    assert_eq!(instance_material(&scene, "n/0"), MaterialBinding::Unbound);
    assert_eq!(instance_material(&scene, "n/1"), MaterialBinding::Bound("m".to_string()));
}

#[test]
fn test_failed_material_leaves_slot_unbound() {
    let source = format!(
        "{}{}{}",
        BOX_NODE, TRIANGLE_OBJECT, r#"Material $material1 (shiny = true) {}"#
    );
    let result = import(&source);
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, ImportError::UnresolvedReference { identifier, .. } if identifier == "MaterialRef")));
    assert_eq!(instance_material(&result.scene, "Box/0"), MaterialBinding::Unbound);
}

#[test]
fn test_object_transform_applies_to_instance_only() {
    let source = format!(
        "{}{}",
        r#"
        GeometryNode $n
        {
            ObjectRef {ref {$geometry1}}
            Translation {float[3] {{1, 0, 0}}}
            Scale (object = true) {float[3] {{2, 2, 2}}}
        }
        "#,
        TRIANGLE_OBJECT
    );
    let scene = import_clean(&source);
    let instance = scene.resource("n/0").and_then(Resource::as_mesh_instance).expect("instance");
    assert_eq!(instance.object_transform, Matrix4::scale(Vector3::new(2.0, 2.0, 2.0)));
    assert_eq!(
        scene.node(instance.node).local_transform,
        Matrix4::translation(Vector3::new(1.0, 0.0, 0.0))
    );
}

#[test]
fn test_visibility_comes_from_node_then_object() {
    let source = format!(
        "{}{}",
        r#"GeometryNode $n (visible = false) { ObjectRef {ref {$geometry1}} }"#,
        TRIANGLE_OBJECT.replace("GeometryObject $geometry1", "GeometryObject $geometry1 (shadow = false)")
    );
    let scene = import_clean(&source);
    let instance = scene.resource("n/0").and_then(Resource::as_mesh_instance).expect("instance");
    assert!(!instance.visible);
    assert!(!instance.cast_shadows);
}

#[test]
fn test_nodes_sharing_a_name_keep_their_instances() {
    let node = BOX_NODE.replace("    MaterialRef {ref {$material1}}\n", "");
    let source = format!("{}{}{}", node, node.replace("$node1", "$node2"), TRIANGLE_OBJECT);
    let scene = import_clean(&source);
    let instances: Vec<&str> = scene
        .resources()
        .iter()
        .filter(|(_, r)| r.as_mesh_instance().is_some())
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(instances, ["Box#1/0", "Box/0"]);
    let first = scene.resource("Box/0").and_then(Resource::as_mesh_instance).expect("instance");
    let second = scene.resource("Box#1/0").and_then(Resource::as_mesh_instance).expect("instance");
    assert_eq!(first.node, NodeId(0));
    assert_eq!(second.node, NodeId(1));
}

#[test]
fn test_local_and_global_names_get_distinct_resources() {
    let scene = import_clean(r#"Material $a { Name {string {"Global"}} } Material %a { Name {string {"Local"}} }"#);
    let global = scene.resource("a").and_then(Resource::as_material).expect("material");
    let local = scene.resource("a#1").and_then(Resource::as_material).expect("material");
    assert_eq!(global.name, "Global");
    assert_eq!(local.name, "Local");
}

#[test]
fn test_object_ref_to_wrong_kind_fails() {
    let result = import(r#"GeometryNode $g { ObjectRef {ref {$m}} } Material $m {}"#);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("GeometryObject"));
    assert_eq!(result.scene.nodes().len(), 1);
    assert!(result.scene.resource("m").is_some());
}

#[test]
fn test_unresolved_object_reference() {
    let result = import(r#"GeometryNode $g { ObjectRef {ref {$missing}} }"#);
    assert_eq!(
        result.errors,
        vec![ImportError::unresolved("ObjectRef", "$missing")]
    );
}

#[test]
fn test_geometry_object_that_fails_reports_waiting_node() {
    let result = import(
        r#"
        GeometryNode $node { ObjectRef {ref {$broken}} }
        GeometryObject $broken (solid = true) { Mesh { VertexArray (attrib = "position") {float[3] {{0, 0, 0}}} } }
        "#,
    );
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[1], ImportError::unresolved("GeometryNode", "$broken"));
}

// ── Materials ───────────────────────────────────────────────────────

#[test]
fn test_material_params_and_textures() {
    let scene = import_clean(
        r#"
        Material $m (two_sided = true)
        {
            Color (attrib = "specular") {float[4] {{0.5, 0.5, 0.5, 0.25}}}
            Param (attrib = "specular_power") {float {32}}
            Texture (attrib = "diffuse", texcoord = 1)
            {
                string {"textures/" "wood.png"}
                Scale (kind = "x") {float {2}}
            }
        }
        "#,
    );
    let material = scene.resource("m").and_then(Resource::as_material).expect("material");
    assert!(material.two_sided);
    assert_eq!(material.name, "m");
    assert_eq!(material.colors["specular"], [0.5, 0.5, 0.5, 0.25]);
    assert_eq!(material.params["specular_power"], 32.0);
    let texture = &material.textures["diffuse"];
    assert_eq!(texture.file, "textures/wood.png");
    assert_eq!(texture.texcoord, 1);
    assert_eq!(texture.transform, Matrix4::scale(Vector3::new(2.0, 1.0, 1.0)));
}

#[test]
fn test_texcoord_must_fit_u32() {
    let result = import(
        r#"Material $m { Texture (attrib = "diffuse", texcoord = 4294967296) {string {"a.png"}} }"#,
    );
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string().contains("texcoord 4294967296 out of range")));
}

#[test]
fn test_bad_color_is_reported_material_survives() {
    let result = import(
        r#"
        Material $m
        {
            Color (attrib = "diffuse") {float[2] {{1, 0}}}
            Param (attrib = "roughness") {float {0.5}}
        }
        "#,
    );
    assert_eq!(result.errors.len(), 1);
    let material = result.scene.resource("m").and_then(Resource::as_material).expect("material");
    assert!(material.colors.is_empty());
    assert_eq!(material.params["roughness"], 0.5);
}

// ── Cameras and lights ──────────────────────────────────────────────

#[test]
fn test_camera_and_light_instances() {
    let scene = import_clean(
        r#"
        CameraNode $c { ObjectRef {ref {$cam}} }
        CameraObject $cam
        {
            Param (attrib = "fov") {float {1}}
            Param (attrib = "near") {float {0.1}}
        }
        LightNode $l { ObjectRef {ref {$light}} }
        LightObject $light (type = "point", shadow = false)
        {
            Color (attrib = "light") {float[3] {{1, 0.5, 0.25}}}
            Param (attrib = "intensity") {float {4}}
            Atten (curve = "inverse") { Param (attrib = "scale") {float {1}} }
        }
        "#,
    );
    let camera = scene.resource("cam").and_then(Resource::as_camera).expect("camera");
    assert_eq!(camera.fov, Some(1.0));
    assert!(approx(camera.near.unwrap_or_default(), 0.1));
    assert_eq!(camera.far, None);

    let light = scene.resource("light").and_then(Resource::as_light).expect("light");
    assert_eq!(light.color, [1.0, 0.5, 0.25]);
    assert_eq!(light.intensity, 4.0);
    assert!(!light.cast_shadows);

    match scene.resource("c/camera") {
        Some(Resource::CameraInstance(instance)) => assert_eq!(instance.object, "cam"),
        other => panic!("expected camera instance, got {:?}", other),
    }
    match scene.resource("l/light") {
        Some(Resource::LightInstance(instance)) => {
            assert_eq!(instance.object, "light");
            assert_eq!(scene.node(instance.node).tag, "l");
        }
        other => panic!("expected light instance, got {:?}", other),
    }
}

#[test]
fn test_unknown_light_type_fails() {
    let result = import(r#"LightObject $l (type = "area") {}"#);
    assert_eq!(result.errors.len(), 1);
    assert!(result.scene.resource("l").is_none());
}

// ── Skins ───────────────────────────────────────────────────────────

const SKINNED: &str = r#"
Node $armature
{
    BoneNode $bone1
    {
        Name {string {"Hip"}}
        BoneNode $bone2
        {
            Name {string {"Knee"}}
            Translation {float[3] {{0, 1, 0}}}
        }
    }
}
GeometryNode $skinned { ObjectRef {ref {$mesh}} }
GeometryObject $mesh
{
    Mesh
    {
        VertexArray (attrib = "position") {float[3] {{0, 0, 0}, {1, 0, 0}, {0, 1, 0}}}
        IndexArray {unsigned_int32[3] {{0, 1, 2}}}
        Skin
        {
            Skeleton
            {
                BoneRefArray {ref {$bone1, $bone2}}
                Transform
                {
                    float[16]
                    {
                        {1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1},
                        {1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 1, 0, 1}
                    }
                }
            }
            BoneCountArray {unsigned_int16 {1, 2, 1}}
            BoneIndexArray {unsigned_int16 {0, 0, 1, 1}}
            BoneWeightArray {float {1, 0.5, 0.5, 1}}
        }
    }
}
"#;

#[test]
fn test_skin_and_skeleton() {
    let scene = import_clean(SKINNED);
    let mesh = scene.resource("mesh").and_then(Resource::as_mesh).expect("mesh");
    let skin = mesh.skin.as_ref().expect("skin");
    assert_eq!(skin.max_bones_per_vertex, 2);
    assert_eq!(skin.bone_indices, vec![0, UNUSED_BONE, 0, 1, 1, UNUSED_BONE]);
    assert_eq!(skin.bone_weights, vec![1.0, 0.0, 0.5, 0.5, 1.0, 0.0]);
    assert_eq!(skin.influences(1), vec![(0, 0.5), (1, 0.5)]);
    assert_eq!(skin.skeleton, "mesh/skeleton");

    let skeleton = scene
        .resource("mesh/skeleton")
        .and_then(Resource::as_skeleton)
        .expect("skeleton");
    let names: Vec<&str> = skeleton.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["Hip", "Knee"]);
    assert_eq!(skeleton.bones[0].parent, None);
    assert_eq!(skeleton.bones[1].parent, Some(0));
    assert_eq!(skeleton.bone_index("Knee"), Some(1));
    let knee = &skeleton.bones[1];
    assert!((knee.inverse_bind_pose * knee.bind_pose).approx_eq(&Matrix4::IDENTITY, 1.0e-6));
    assert_eq!(scene.node(knee.node).tag, "Knee");
}

#[test]
fn test_skins_can_be_disabled() {
    let options = ImportOptions {
        process_skins: false,
        ..ImportOptions::default()
    };
    let result = import_opengex(SKINNED.as_bytes(), &options);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let mesh = result.scene.resource("mesh").and_then(Resource::as_mesh).expect("mesh");
    assert!(mesh.skin.is_none());
    assert!(result.scene.resource("mesh/skeleton").is_none());
}

#[test]
fn test_skin_counts_are_cross_checked() {
    let source = SKINNED.replace("{float {1, 0.5, 0.5, 1}}", "{float {1, 0.5, 0.5}}");
    let result = import(&source);
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string().contains("expected 4 bone weights, found 3")));
    assert!(result.scene.resource("mesh").is_none());
}

#[test]
fn test_bone_counts_are_bounded() {
    let source = SKINNED
        .replace(
            "BoneCountArray {unsigned_int16 {1, 2, 1}}",
            "BoneCountArray {unsigned_int64 {18446744073709551615, 1, 0}}",
        )
        .replace("{unsigned_int16 {0, 0, 1, 1}}", "{unsigned_int16 {}}")
        .replace("{float {1, 0.5, 0.5, 1}}", "{float {}}");
    let result = import(&source);
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string().contains("bone count 18446744073709551615 exceeds 2 bones")));
    assert!(result.scene.resource("mesh").is_none());

    let source = SKINNED.replace("{unsigned_int16 {1, 2, 1}}", "{unsigned_int16 {3, 0, 1}}");
    let result = import(&source);
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string().contains("bone count 3 exceeds 2 bones")));
}

// ── Animation ───────────────────────────────────────────────────────

fn animated_node(animation: &str) -> String {
    format!(
        r#"
        Node $n
        {{
            Translation %t (kind = "x") {{float {{0}}}}
            Scale %s (kind = "y") {{float {{1}}}}
            {}
        }}
        "#,
        animation
    )
}

fn animation(scene: &Scene, name: &str) -> crate::resource::AnimationInstance {
    scene
        .resource(name)
        .and_then(Resource::as_animation)
        .cloned()
        .unwrap_or_else(|| panic!("missing animation {}", name))
}

#[test]
fn test_linear_track_samples_key_times() {
    let scene = import_clean(&animated_node(
        r#"
        Animation
        {
            Track (target = %t)
            {
                Time {Key {float {0, 1}}}
                Value {Key {float {0, 2}}}
            }
        }
        "#,
    ));
    let anim = animation(&scene, "n/animation0");
    assert_eq!(anim.times, vec![0.0, 1.0]);
    assert_eq!(anim.num_keyframes(), 2);
    assert!(approx(anim.transforms[0].get(0, 3), 0.0));
    assert!(approx(anim.transforms[1].get(0, 3), 2.0));
}

#[test]
fn test_clip_must_fit_u32() {
    let result = import(&animated_node(
        r#"
        Animation (clip = 4294967296)
        {
            Track (target = %t) { Time {Key {float {0, 1}}} Value {Key {float {0, 2}}} }
        }
        "#,
    ));
    assert!(result
        .errors
        .iter()
        .any(|e| e.to_string().contains("clip 4294967296 out of range")));
    assert!(!result
        .scene
        .resources()
        .values()
        .any(|r| r.as_animation().is_some()));
}

#[test]
fn test_sample_times_are_union_of_tracks() {
    let scene = import_clean(&animated_node(
        r#"
        Animation (clip = 2)
        {
            Track (target = %t)
            {
                Time {Key {float {0, 1}}}
                Value {Key {float {0, 2}}}
            }
            Track (target = %s)
            {
                Time {Key {float {0.5, 1}}}
                Value {Key {float {1, 3}}}
            }
        }
        "#,
    ));
    let anim = animation(&scene, "n/animation2");
    assert_eq!(anim.clip, 2);
    assert_eq!(anim.times, vec![0.0, 0.5, 1.0]);
    assert!(approx(anim.transforms[1].get(0, 3), 1.0));
    assert!(approx(anim.transforms[1].get(1, 1), 1.0));
    assert!(approx(anim.transforms[2].get(0, 3), 2.0));
    assert!(approx(anim.transforms[2].get(1, 1), 3.0));
}

#[test]
fn test_begin_end_clamp_and_time_metric() {
    let scene = import_clean(&format!(
        r#"Metric (key = "time") {{float {{2}}}} {}"#,
        animated_node(
            r#"
            Animation (begin = 0.25, end = 0.75)
            {
                Track (target = %t)
                {
                    Time {Key {float {0, 1}}}
                    Value {Key {float {0, 2}}}
                }
            }
            "#,
        )
    ));
    let anim = animation(&scene, "n/animation0");
    assert_eq!(anim.times, vec![0.5, 1.5]);
    assert!(approx(anim.transforms[0].get(0, 3), 0.5));
    assert!(approx(anim.transforms[1].get(0, 3), 1.5));
}

/// A second track keyed at 0.5 forces a sample inside the first track's
/// only segment.
fn midpoint_sample(value: &str) -> f32 {
    let scene = import_clean(&animated_node(&format!(
        r#"
        Animation
        {{
            Track (target = %t) {{ Time {{Key {{float {{0, 1}}}}}} {} }}
            Track (target = %s) {{ Time {{Key {{float {{0, 0.5, 1}}}}}} Value {{Key {{float {{1, 1, 1}}}}}} }}
        }}
        "#,
        value
    )));
    let anim = animation(&scene, "n/animation0");
    assert_eq!(anim.times, vec![0.0, 0.5, 1.0]);
    anim.transforms[1].get(0, 3)
}

#[test]
fn test_value_curves() {
    assert!(approx(midpoint_sample("Value {Key {float {0, 2}}}"), 1.0));
    assert!(approx(
        midpoint_sample(r#"Value (curve = "constant") {Key {float {0, 2}}}"#),
        0.0
    ));
    assert!(approx(
        midpoint_sample(
            r#"Value (curve = "bezier")
            {
                Key {float {0, 3}}
                Key (kind = "-control") {float {0, 2.5}}
                Key (kind = "+control") {float {2, 3}}
            }"#
        ),
        2.0625
    ));
    assert!(approx(
        midpoint_sample(
            r#"Value (curve = "tcb")
            {
                Key {float {0, 1}}
                Key (kind = "tension") {float {0, 0}}
                Key (kind = "continuity") {float {0, 0}}
                Key (kind = "bias") {float {0, 0}}
            }"#
        ),
        0.5
    ));
}

#[test]
fn test_value_key_count_must_match_times() {
    let result = import(&animated_node(
        r#"
        Animation
        {
            Track (target = %t)
            {
                Time {Key {float {0, 1}}}
                Value {Key {float {0, 1, 2}}}
            }
        }
        "#,
    ));
    assert_eq!(result.errors.len(), 1);
    assert!(result.scene.resource("n/animation0").is_none());
}

#[test]
fn test_track_target_must_be_node_transform() {
    let result = import(
        r#"
        Node $a { Translation %t {float[3] {{0, 0, 0}}} }
        Node $b
        {
            Animation { Track (target = $a) { Time {Key {float {0}}} Value {Key {float {0}}} } }
        }
        "#,
    );
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("not a transform"));
}

#[test]
fn test_animations_can_be_disabled() {
    let options = ImportOptions {
        process_animations: false,
        ..ImportOptions::default()
    };
    let source = animated_node(
        r#"Animation { Track (target = %t) { Time {Key {float {0, 1}}} Value {Key {float {0, 2}}} } }"#,
    );
    let result = import_opengex(source.as_bytes(), &options);
    assert!(result.errors.is_empty());
    assert!(result.scene.resources().is_empty());
    assert_eq!(result.scene.nodes().len(), 1);
}

// ── Error discipline and the scene-graph seam ───────────────────────

#[test]
fn test_parse_error_is_the_only_error_and_scene_untouched() {
    let result = import(r#"Node $a {} Node {"#);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(&result.errors[0], ImportError::Parse(err) if !err.is_lexical()));
    assert_eq!(result.errors[0].code(), "ddl-syntax-error");
    assert!(result.scene.nodes().is_empty());
}

#[test]
fn test_siblings_are_processed_after_errors() {
    let result = import(
        r#"
        Mesh {}
        Node $first {}
        Node (bogus = 1) {}
        Node $second {}
        "#,
    );
    assert_eq!(result.errors.len(), 2);
    let tags: Vec<&str> = result.scene.nodes().iter().map(|n| n.tag.as_str()).collect();
    assert_eq!(tags, ["first", "second"]);
}

/// Records calls instead of building a tree.
#[derive(Default)]
struct Recorder {
    tags: Vec<String>,
    links: Vec<(NodeId, NodeId)>,
    resources: Vec<String>,
}

impl SceneGraph for Recorder {
    fn create_node(&mut self) -> NodeId {
        self.tags.push(String::new());
        NodeId(self.tags.len() - 1)
    }

    fn set_local_transform(&mut self, _node: NodeId, _transform: Matrix4) {}

    fn set_tag(&mut self, node: NodeId, tag: &str) {
        self.tags[node.0] = tag.to_string();
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.links.push((parent, child));
    }

    fn get_parent(&self, node: NodeId) -> Option<NodeId> {
        self.links.iter().find(|(_, c)| *c == node).map(|(p, _)| *p)
    }

    fn set_resource(&mut self, name: &str, _resource: Resource) {
        self.resources.push(name.to_string());
    }
}

#[test]
fn test_import_into_custom_scene_graph() {
    let source = format!("{}{}{}", BOX_NODE, TRIANGLE_OBJECT, RED_MATERIAL);
    let result = import_opengex_into(source.as_bytes(), Recorder::default(), &ImportOptions::default());
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.scene.tags, vec!["Box".to_string()]);
    assert!(result.scene.links.is_empty());
    let mut resources = result.scene.resources.clone();
    resources.sort();
    assert_eq!(resources, ["Box/0", "geometry1", "material1"]);
}
