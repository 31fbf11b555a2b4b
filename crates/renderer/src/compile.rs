use std::borrow::Cow;

use anyhow::{anyhow, Result};
use wgpu::naga::ShaderStage;

/// Compiles the plane vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(device, "water plane vertex", VERTEX_SHADER_GLSL, ShaderStage::Vertex)
}

/// Compiles the water surface fragment shader.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "water surface fragment",
        &fragment_source(),
        ShaderStage::Fragment,
    )
}

/// Hands GLSL to naga inside a validation error scope so a broken shader is
/// reported as an error instead of tripping the device's uncaptured error
/// handler.
fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("failed to compile {label}: {err}"));
    }
    Ok(module)
}

pub(crate) fn fragment_source() -> String {
    format!("{UNIFORM_HEADER}\n{FRAGMENT_BODY}")
}

/// Uniform block shared by both stages.
///
/// The layout must match `WaterUniforms` in the gpu module; std140 places the
/// ripple array at offset 32 and the whole block is 112 bytes.
const UNIFORM_HEADER: &str = r"#version 450

layout(std140, set = 0, binding = 0) uniform WaterParams {
    vec2 uResolution;
    float uTime;
    float uMixFactor;
    float uAspect;
    int uRippleCount;
    vec2 _padding0;
    vec4 uRipples[5];
} params;
";

const FRAGMENT_BODY: &str = r"layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D current_texture;
layout(set = 1, binding = 1) uniform sampler current_sampler;
layout(set = 1, binding = 2) uniform texture2D next_texture;
layout(set = 1, binding = 3) uniform sampler next_sampler;

vec3 mod289_3(vec3 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec2 mod289_2(vec2 x) {
    return x - floor(x * (1.0 / 289.0)) * 289.0;
}

vec3 permute(vec3 x) {
    return mod289_3(((x * 34.0) + 1.0) * x);
}

float snoise(vec2 v) {
    vec4 C = vec4(0.211324865405187, 0.366025403784439, -0.577350269189626, 0.024390243902439);
    vec2 i = floor(v + dot(v, C.yy));
    vec2 x0 = v - i + dot(i, C.xx);
    vec2 i1 = (x0.x > x0.y) ? vec2(1.0, 0.0) : vec2(0.0, 1.0);
    vec4 x12 = x0.xyxy + C.xxzz;
    x12 = vec4(x12.xy - i1, x12.zw);
    i = mod289_2(i);
    vec3 p = permute(permute(i.y + vec3(0.0, i1.y, 1.0)) + i.x + vec3(0.0, i1.x, 1.0));
    vec3 m = max(0.5 - vec3(dot(x0, x0), dot(x12.xy, x12.xy), dot(x12.zw, x12.zw)), vec3(0.0));
    m = m * m;
    m = m * m;
    vec3 x = 2.0 * fract(p * C.www) - 1.0;
    vec3 h = abs(x) - 0.5;
    vec3 ox = floor(x + 0.5);
    vec3 a0 = x - ox;
    m = m * (1.79284291400159 - 0.85373472095314 * (a0 * a0 + h * h));
    vec3 g = vec3(
        a0.x * x0.x + h.x * x0.y,
        a0.y * x12.x + h.y * x12.y,
        a0.z * x12.z + h.z * x12.w
    );
    return 130.0 * dot(m, g);
}

vec4 sample_current(vec2 uv) {
    return texture(sampler2D(current_texture, current_sampler), uv);
}

vec4 sample_next(vec2 uv) {
    return texture(sampler2D(next_texture, next_sampler), uv);
}

void main() {
    vec2 uv = v_uv;
    float t = params.uTime;

    float ambient = sin(uv.x * 10.0 + t * 0.5) * cos(uv.y * 8.0 + t * 0.3) * 0.001
        + sin(uv.x * 15.0 - t * 0.4) * cos(uv.y * 12.0 - t * 0.6) * 0.0008;

    float caustics = snoise(uv * 8.0 + t * 0.2) * 0.5 + 0.5;
    caustics = caustics + snoise(uv * 12.0 - t * 0.15) * 0.3;
    caustics = caustics * caustics * 0.005;

    vec2 distortion = vec2(0.0);
    float total = 0.0;
    for (int k = 0; k < 5; k++) {
        if (k >= params.uRippleCount) {
            break;
        }
        vec4 ripple = params.uRipples[k];
        vec2 diff = uv - ripple.xy;
        float dist = length(diff);
        float age = t - ripple.z;
        float radius = age * 0.3;
        float width = 0.05;
        float decay = exp(-age * 2.0);
        float offset = dist - radius;
        float wave1 = sin(offset * 40.0) * decay;
        float wave2 = sin(offset * 60.0) * decay * 0.5;
        float wave3 = cos(offset * 50.0) * decay * 0.3;
        float mask = smoothstep(radius + width, radius, dist)
            * smoothstep(radius - width * 3.0, radius, dist);
        float strength = (wave1 + wave2 + wave3) * mask * 0.008;
        total = total + strength;
        if (dist > 0.001) {
            distortion = distortion + normalize(diff) * strength;
        }
    }

    vec2 finalUV = uv + distortion + vec2(ambient);
    vec4 first = sample_current(finalUV);
    vec4 second = sample_next(finalUV);
    vec4 texel = first * (1.0 - params.uMixFactor) + second * params.uMixFactor;

    vec3 color = texel.rgb;
    color = color + vec3(caustics * 0.3);

    float fresnel = length(uv - vec2(0.5)) * 1.5;
    color = color + vec3(fresnel * fresnel * 0.03);

    float lifted = max(total * 10.0, 0.0);
    float specular = lifted * lifted * lifted * 0.2;
    color = color + vec3(1.0, 1.0, 0.95) * specular;

    if (abs(total) > 0.005) {
        float aberration = total * 2.0 * 0.002;
        float red = sample_current(finalUV + vec2(aberration, 0.0)).r;
        float blue = sample_current(finalUV - vec2(aberration, 0.0)).b;
        color = vec3(mix(color.r, red, 0.3), color.g, mix(color.b, blue, 0.3));
    }

    color = color / (color + vec3(1.0));
    color = pow(max(color, vec3(0.0)), vec3(0.98));
    outColor = vec4(color, 1.0);
}
";

/// Plane vertex shader. Positions are in view units; dividing x by the screen
/// aspect maps the `[-aspect, aspect] x [-1, 1]` orthographic view onto clip
/// space.
const VERTEX_SHADER_GLSL: &str = r"#version 450

layout(std140, set = 0, binding = 0) uniform WaterParams {
    vec2 uResolution;
    float uTime;
    float uMixFactor;
    float uAspect;
    int uRippleCount;
    vec2 _padding0;
    vec4 uRipples[5];
} params;

layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position.x / params.uAspect, a_position.y, 0.0, 1.0);
}
";
