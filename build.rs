// 构建脚本: 链接FFmpeg依赖库
fn main() {
    // 仅在Windows MSVC环境下添加FFmpeg相关库
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // x264 编码器 (保存检测视频)
        println!("cargo:rustc-link-lib=dylib=libx264");

        // OLE 自动化和VFW (DirectShow 摄像头)
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");
        println!("cargo:rustc-link-lib=dylib=strmiids");
    }
}
