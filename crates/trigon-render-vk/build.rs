use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Vertex shader: the triangle is baked in and indexed by gl_VertexIndex,
    // so the pipeline declares no vertex input at all. Winding is clockwise
    // in Vulkan's y-down framebuffer space to match the pipeline's
    // FrontFace::CLOCKWISE + back-face culling.
    let vs_src = r#"
#version 450

layout(location = 0) out vec3 vColor;

vec2 positions[3] = vec2[](
    vec2( 0.0, -0.5),
    vec2( 0.5,  0.5),
    vec2(-0.5,  0.5)
);

vec3 colors[3] = vec3[](
    vec3(1.0, 0.0, 0.0),
    vec3(0.0, 1.0, 0.0),
    vec3(0.0, 0.0, 1.0)
);

void main() {
    gl_Position = vec4(positions[gl_VertexIndex], 0.0, 1.0);
    vColor = colors[gl_VertexIndex];
}
"#;

    let fs_src = r#"
#version 450

layout(location = 0) in vec3 vColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor, 1.0);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let vs_spv = comp
        .compile_into_spirv(
            vs_src,
            shaderc::ShaderKind::Vertex,
            "tri.vert",
            "main",
            Some(&opts),
        )
        .unwrap();

    let fs_spv = comp
        .compile_into_spirv(
            fs_src,
            shaderc::ShaderKind::Fragment,
            "tri.frag",
            "main",
            Some(&opts),
        )
        .unwrap();

    fs::write(out.join("tri.vert.spv"), vs_spv.as_binary_u8()).unwrap();
    fs::write(out.join("tri.frag.spv"), fs_spv.as_binary_u8()).unwrap();

    // Re-run if this file changes (inline sources live here)
    println!("cargo:rerun-if-changed=build.rs");
}
